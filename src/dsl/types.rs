//! Core DSL data types: tag references, tree references, selectors, and
//! the three command variants (`alias`, `update`, `split`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A tag as observed at a site/plot, optionally pinned to a date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagRef {
    pub site: String,
    pub plot: String,
    pub tag: String,
    /// `None` means "resolve at the command's effective date".
    pub at: Option<NaiveDate>,
}

/// A reference to a tree, either by its stable UUID or by a tag observed at
/// a point in time. Exactly one of the two is populated; callers should
/// construct via [`TreeRef::by_uid`] / [`TreeRef::by_tag`] rather than the
/// variant directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TreeRef {
    ByUuid { tree_uid: String },
    ByTagAt { tag: TagRef },
}

impl TreeRef {
    pub fn by_uid(tree_uid: impl Into<String>) -> Self {
        TreeRef::ByUuid {
            tree_uid: tree_uid.into(),
        }
    }

    pub fn by_tag(tag: TagRef) -> Self {
        TreeRef::ByTagAt { tag }
    }

    fn signature(&self) -> String {
        match self {
            TreeRef::ByUuid { tree_uid } => format!("uid:{tree_uid}"),
            TreeRef::ByTagAt { tag } => format!(
                "tag:{}/{}/{}@{}",
                tag.site,
                tag.plot,
                tag.tag,
                tag.at.map(|d| d.to_string()).unwrap_or_default()
            ),
        }
    }
}

/// Strategy used by a split command to pick which rows move to the new tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    All,
    Largest,
    Smallest,
    Ranks,
}

/// Optional date window restricting which survey rows a selector considers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorDateFilter {
    pub kind: DateFilterKind,
    pub first: NaiveDate,
    pub second: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFilterKind {
    Before,
    After,
    Between,
}

impl SelectorDateFilter {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self.kind {
            DateFilterKind::Before => date < self.first,
            DateFilterKind::After => date > self.first,
            DateFilterKind::Between => {
                let second = self.second.expect("BETWEEN filter requires a second date");
                date >= self.first && date <= second
            }
        }
    }
}

/// Which rows a split command moves to the target tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub strategy: SelectorStrategy,
    pub ranks: Vec<u32>,
    pub date_filter: Option<SelectorDateFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasCommand {
    pub line_no: usize,
    pub target: TagRef,
    pub tree_ref: TreeRef,
    pub primary: bool,
    pub effective_date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCommand {
    pub line_no: usize,
    pub tree_ref: TreeRef,
    pub assignments: std::collections::BTreeMap<String, String>,
    pub effective_date: Option<NaiveDate>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCommand {
    pub line_no: usize,
    pub source: TreeRef,
    pub target: TagRef,
    pub primary: bool,
    pub effective_date: Option<NaiveDate>,
    pub selector: Option<Selector>,
    pub note: Option<String>,
}

/// A single DSL statement. Each variant carries its own `line_no` for
/// diagnostics and its own idempotency signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Alias(AliasCommand),
    Update(UpdateCommand),
    Split(SplitCommand),
}

impl Command {
    pub fn line_no(&self) -> usize {
        match self {
            Command::Alias(c) => c.line_no,
            Command::Update(c) => c.line_no,
            Command::Split(c) => c.line_no,
        }
    }

    pub fn effective_date(&self) -> Option<NaiveDate> {
        match self {
            Command::Alias(c) => c.effective_date,
            Command::Update(c) => c.effective_date,
            Command::Split(c) => c.effective_date,
        }
    }

    pub fn with_effective_date(&self, date: NaiveDate) -> Command {
        match self.clone() {
            Command::Alias(mut c) => {
                c.effective_date = Some(date);
                Command::Alias(c)
            }
            Command::Update(mut c) => {
                c.effective_date = Some(date);
                Command::Update(c)
            }
            Command::Split(mut c) => {
                c.effective_date = Some(date);
                Command::Split(c)
            }
        }
    }

    /// Structural signature used to de-duplicate identical commands within a
    /// single transaction submission. Deliberately excludes `note`, since a
    /// comment change should not make an otherwise-identical command distinct.
    pub fn signature(&self) -> String {
        match self {
            Command::Alias(c) => format!(
                "alias|{}/{}/{}|{}|{}|{}",
                c.target.site,
                c.target.plot,
                c.target.tag,
                c.tree_ref.signature(),
                c.primary,
                c.effective_date.map(|d| d.to_string()).unwrap_or_default(),
            ),
            Command::Update(c) => {
                let assignments = c
                    .assignments
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(",");
                format!(
                    "update|{}|{}|{}",
                    c.tree_ref.signature(),
                    assignments,
                    c.effective_date.map(|d| d.to_string()).unwrap_or_default(),
                )
            }
            Command::Split(c) => {
                let selector = c
                    .selector
                    .as_ref()
                    .map(|s| format!("{:?}|{:?}|{:?}", s.strategy, s.ranks, s.date_filter))
                    .unwrap_or_default();
                format!(
                    "split|{}|{}/{}/{}|{}|{}|{}",
                    c.source.signature(),
                    c.target.site,
                    c.target.plot,
                    c.target.tag,
                    c.primary,
                    c.effective_date.map(|d| d.to_string()).unwrap_or_default(),
                    selector,
                )
            }
        }
    }
}
