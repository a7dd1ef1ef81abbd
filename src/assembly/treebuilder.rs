//! Bitemporal tag→tree resolution: for every `(site, plot, tag)` ever seen,
//! a time-indexed mapping to the current `tree_uid`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::dsl::{Command, TreeRef};
use crate::transactions::MeasurementRow;

/// Namespace used to derive deterministic tree identities from spatial
/// keys. Fixed so that the same tag always resolves to the same base
/// identity across separate invocations.
pub const TAG_NAMESPACE: Uuid = Uuid::from_bytes([
    0xc4, 0xb7, 0x7a, 0x82, 0x05, 0xe2, 0x4d, 0x83, 0x9d, 0x9c, 0x20, 0xf6, 0x21, 0x57, 0xa5, 0xe5,
]);

pub type SpatialKey = (String, String, String);

pub fn tree_uid_for_tag(site: &str, plot: &str, tag: &str) -> String {
    let name = format!("{site}/{plot}/{tag}");
    Uuid::new_v5(&TAG_NAMESPACE, name.as_bytes()).to_string()
}

/// A sorted timeline of `(date, tree_uid)` bindings for one spatial key,
/// with an implicit base entry at `-∞`.
#[derive(Debug, Clone)]
pub struct TagTimeline {
    base_uid: String,
    bindings: Vec<(NaiveDate, String)>,
}

impl TagTimeline {
    pub fn new(base_uid: String) -> Self {
        TagTimeline {
            base_uid,
            bindings: Vec::new(),
        }
    }

    /// Inserts or replaces the binding at date `d`. A later call at the same
    /// date overwrites the earlier one (later-in-stream command wins).
    pub fn bind(&mut self, date: NaiveDate, tree_uid: String) {
        match self.bindings.binary_search_by(|(d, _)| d.cmp(&date)) {
            Ok(idx) => self.bindings[idx].1 = tree_uid,
            Err(idx) => self.bindings.insert(idx, (date, tree_uid)),
        }
    }

    pub fn resolve(&self, date: NaiveDate) -> &str {
        let idx = self.bindings.partition_point(|(d, _)| *d <= date);
        if idx == 0 {
            &self.base_uid
        } else {
            &self.bindings[idx - 1].1
        }
    }
}

/// Owns one [`TagTimeline`] per spatial key ever observed.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    timelines: BTreeMap<SpatialKey, TagTimeline>,
}

impl AliasResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_tag(&mut self, key: &SpatialKey) {
        self.timelines.entry(key.clone()).or_insert_with(|| {
            TagTimeline::new(tree_uid_for_tag(&key.0, &key.1, &key.2))
        });
    }

    pub fn bind(&mut self, key: &SpatialKey, date: NaiveDate, tree_uid: String) {
        self.ensure_tag(key);
        self.timelines.get_mut(key).unwrap().bind(date, tree_uid);
    }

    pub fn resolve(&self, key: &SpatialKey, date: NaiveDate) -> String {
        match self.timelines.get(key) {
            Some(timeline) => timeline.resolve(date).to_string(),
            None => tree_uid_for_tag(&key.0, &key.1, &key.2),
        }
    }

    pub fn resolve_tree_ref(&self, tree_ref: &TreeRef, fallback_date: NaiveDate) -> String {
        match tree_ref {
            TreeRef::ByUuid { tree_uid } => tree_uid.clone(),
            TreeRef::ByTagAt { tag } => {
                let key = (tag.site.clone(), tag.plot.clone(), tag.tag.clone());
                let at = tag.at.unwrap_or(fallback_date);
                self.resolve(&key, at)
            }
        }
    }
}

/// Registers every spatial key present in `rows`, applies `Alias` commands
/// in ascending effective-date order (binding the target tag to the
/// resolved source tree), then applies `Split` commands the same way
/// (binding the target tag to a brand-new tree identity).
pub fn build_alias_resolver(rows: &[MeasurementRow], commands: &[Command]) -> AliasResolver {
    let mut resolver = AliasResolver::new();
    for row in rows {
        resolver.ensure_tag(&row.spatial_key());
    }

    let mut aliases: Vec<&Command> = commands
        .iter()
        .filter(|c| matches!(c, Command::Alias(_)))
        .collect();
    aliases.sort_by_key(|c| c.effective_date());
    for command in aliases {
        if let Command::Alias(alias) = command {
            let Some(date) = alias.effective_date else {
                continue;
            };
            let source_uid = resolver.resolve_tree_ref(&alias.tree_ref, date);
            let key = (
                alias.target.site.clone(),
                alias.target.plot.clone(),
                alias.target.tag.clone(),
            );
            resolver.bind(&key, date, source_uid);
        }
    }

    let mut splits: Vec<&Command> = commands
        .iter()
        .filter(|c| matches!(c, Command::Split(_)))
        .collect();
    splits.sort_by_key(|c| c.effective_date());
    for command in splits {
        if let Command::Split(split) = command {
            let Some(date) = split.effective_date else {
                continue;
            };
            let key = (
                split.target.site.clone(),
                split.target.plot.clone(),
                split.target.tag.clone(),
            );
            let new_uid = tree_uid_for_tag(&key.0, &key.1, &key.2);
            resolver.bind(&key, date, new_uid);
        }
    }

    resolver
}

/// Assigns `tree_uid` to every row via `resolver.resolve((site,plot,tag), row.date)`.
pub fn assign_tree_uids(rows: &mut [MeasurementRow], resolver: &AliasResolver) {
    for row in rows.iter_mut() {
        let key = row.spatial_key();
        row.tree_uid = Some(resolver.resolve(&key, row.date));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_without_bindings_resolves_to_base_identity() {
        let mut resolver = AliasResolver::new();
        let key = ("BRNV".to_string(), "H4".to_string(), "112".to_string());
        resolver.ensure_tag(&key);
        let expected = tree_uid_for_tag("BRNV", "H4", "112");
        assert_eq!(
            resolver.resolve(&key, NaiveDate::from_ymd_opt(2019, 6, 16).unwrap()),
            expected
        );
    }

    #[test]
    fn binding_changes_resolution_from_its_date_onward() {
        let mut resolver = AliasResolver::new();
        let key = ("BRNV".to_string(), "H4".to_string(), "508".to_string());
        resolver.ensure_tag(&key);
        let effective = NaiveDate::from_ymd_opt(2020, 6, 15).unwrap();
        resolver.bind(&key, effective, "target-uid".to_string());
        assert_eq!(
            resolver.resolve(&key, NaiveDate::from_ymd_opt(2020, 6, 14).unwrap()),
            tree_uid_for_tag("BRNV", "H4", "508")
        );
        assert_eq!(resolver.resolve(&key, effective), "target-uid");
    }
}
