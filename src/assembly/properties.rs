//! Per-tree sorted timelines of field assignments (taxonomy, site/plot/tag),
//! applied as-of each measurement's date.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::dsl::Command;
use crate::transactions::MeasurementRow;

use super::treebuilder::AliasResolver;

const RECOGNIZED_KEYS: &[&str] = &["genus", "species", "code", "site", "plot", "tag"];

#[derive(Debug, Clone, Default)]
pub struct PropertyTimeline {
    entries: Vec<(NaiveDate, BTreeMap<String, String>)>,
}

impl PropertyTimeline {
    fn push(&mut self, date: NaiveDate, assignments: BTreeMap<String, String>) {
        let idx = self.entries.partition_point(|(d, _)| *d <= date);
        self.entries.insert(idx, (date, assignments));
    }

    /// Accumulates entries with `date <= query`, later entries overwriting
    /// earlier ones per field.
    pub fn resolve(&self, query: NaiveDate) -> BTreeMap<String, String> {
        let mut result = BTreeMap::new();
        for (date, assignments) in &self.entries {
            if *date <= query {
                for (k, v) in assignments {
                    result.insert(k.clone(), v.clone());
                }
            }
        }
        result
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertyTimelines {
    by_tree: std::collections::HashMap<String, PropertyTimeline>,
}

impl PropertyTimelines {
    pub fn build(commands: &[Command], resolver: &AliasResolver) -> Self {
        let mut timelines = PropertyTimelines::default();
        for command in commands {
            if let Command::Update(update) = command {
                let Some(date) = update.effective_date else { continue };
                let tree_uid = resolver.resolve_tree_ref(&update.tree_ref, date);
                let assignments: BTreeMap<String, String> = update
                    .assignments
                    .iter()
                    .filter(|(k, _)| RECOGNIZED_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                timelines
                    .by_tree
                    .entry(tree_uid)
                    .or_default()
                    .push(date, assignments);
            }
        }
        timelines
    }

    pub fn apply(&self, rows: &mut [MeasurementRow]) {
        for row in rows.iter_mut() {
            let Some(tree_uid) = row.tree_uid.clone() else { continue };
            let Some(timeline) = self.by_tree.get(&tree_uid) else { continue };
            let overrides = timeline.resolve(row.date);
            if let Some(v) = overrides.get("genus") {
                row.genus = Some(v.clone());
            }
            if let Some(v) = overrides.get("species") {
                row.species = Some(v.clone());
            }
            if let Some(v) = overrides.get("code") {
                row.code = Some(v.clone());
            }
            if let Some(v) = overrides.get("site") {
                row.site = v.clone();
            }
            if let Some(v) = overrides.get("plot") {
                row.plot = v.clone();
            }
            if let Some(v) = overrides.get("tag") {
                row.tag = v.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_entry_overrides_only_its_own_fields() {
        let mut timeline = PropertyTimeline::default();
        timeline.push(
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            BTreeMap::from([("genus".to_string(), "Picea".to_string())]),
        );
        timeline.push(
            NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            BTreeMap::from([("species".to_string(), "abies".to_string())]),
        );
        let resolved = timeline.resolve(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(resolved.get("genus").unwrap(), "Picea");
        assert_eq!(resolved.get("species").unwrap(), "abies");
    }
}
