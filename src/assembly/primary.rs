//! Per-tree sorted timelines of the public-facing ("primary") tag.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::dsl::Command;
use crate::transactions::MeasurementRow;

use super::treebuilder::AliasResolver;

#[derive(Debug, Clone, Default)]
pub struct PrimaryTimeline {
    entries: Vec<(NaiveDate, String)>,
}

impl PrimaryTimeline {
    fn push(&mut self, date: NaiveDate, tag: String) {
        let idx = self.entries.partition_point(|(d, _)| *d <= date);
        self.entries.insert(idx, (date, tag));
    }

    /// Returns the tag from the latest entry with `date <= query`, if any.
    pub fn resolve(&self, query: NaiveDate) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(d, _)| *d <= query)
            .map(|(_, tag)| tag.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrimaryTimelines {
    by_tree: HashMap<String, PrimaryTimeline>,
}

impl PrimaryTimelines {
    /// Resolves the primary tag bound to `tree_uid` as of `date`, if any
    /// primary-alias command has ever targeted that tree.
    pub fn resolve_tag_for(&self, tree_uid: &str, date: NaiveDate) -> Option<&str> {
        self.by_tree.get(tree_uid).and_then(|timeline| timeline.resolve(date))
    }

    pub fn build(commands: &[Command], resolver: &AliasResolver) -> Self {
        let mut timelines = PrimaryTimelines::default();
        for command in commands {
            if let Command::Alias(alias) = command {
                if !alias.primary {
                    continue;
                }
                let Some(date) = alias.effective_date else { continue };
                let tree_uid = resolver.resolve_tree_ref(&alias.tree_ref, date);
                timelines
                    .by_tree
                    .entry(tree_uid)
                    .or_default()
                    .push(date, alias.target.tag.clone());
            }
        }
        timelines
    }

    /// Sets `public_tag` on every row with a tree_uid: the resolved primary
    /// tag at the row's date, falling back to an already-set `public_tag`
    /// or the row's own `tag` field.
    pub fn apply(&self, rows: &mut [MeasurementRow]) {
        for row in rows.iter_mut() {
            let Some(tree_uid) = row.tree_uid.clone() else { continue };
            let resolved = self
                .by_tree
                .get(&tree_uid)
                .and_then(|timeline| timeline.resolve(row.date));
            row.public_tag = match resolved {
                Some(tag) => Some(tag.to_string()),
                None => row.public_tag.clone().or_else(|| Some(row.tag.clone())),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::{MeasurementRow, Origin};

    fn row() -> MeasurementRow {
        MeasurementRow {
            row_number: 1,
            site: "BRNV".into(),
            plot: "H4".into(),
            tag: "112".into(),
            date: NaiveDate::from_ymd_opt(2019, 6, 16).unwrap(),
            dbh_mm: Some(171),
            health: Some(9),
            standing: Some(true),
            notes: None,
            genus: None,
            species: None,
            code: None,
            origin: Origin::Field,
            flags: Vec::new(),
            raw: Default::default(),
            tree_uid: Some("tree-1".into()),
            public_tag: None,
            source_tx: "tx1".into(),
        }
    }

    #[test]
    fn falls_back_to_tag_without_any_primary_entry() {
        let timelines = PrimaryTimelines::default();
        let mut rows = vec![row()];
        timelines.apply(&mut rows);
        assert_eq!(rows[0].public_tag.as_deref(), Some("112"));
    }
}
