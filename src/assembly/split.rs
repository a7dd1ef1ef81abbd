//! Retroactively reassigns historical measurements of a source tree to a
//! new tree according to a split command's selector.

use std::collections::HashMap;

use crate::dsl::{Command, SelectorStrategy};
use crate::transactions::MeasurementRow;

use super::survey::SurveyCatalog;
use super::treebuilder::{tree_uid_for_tag, AliasResolver};

/// Sort key used by both `LARGEST` and `SMALLEST`: `(-dbh, -health, row_number)`.
/// Ascending order under this key yields "largest dbh first, then largest
/// health, then smallest row_number" — the `LARGEST` ordering.
fn dbh_sort_key(row: &MeasurementRow) -> (i64, i64, usize) {
    (
        -row.dbh_mm.unwrap_or(0),
        -row.health.unwrap_or(0),
        row.row_number,
    )
}

/// Applies every `Split` command (in ascending effective-date order) to
/// `rows`, reassigning `tree_uid` on the selected historical rows.
pub fn apply_splits(
    rows: &mut [MeasurementRow],
    commands: &[Command],
    resolver: &AliasResolver,
    catalog: &SurveyCatalog,
) {
    let mut splits: Vec<&Command> = commands
        .iter()
        .filter(|c| matches!(c, Command::Split(_)))
        .collect();
    splits.sort_by_key(|c| c.effective_date());

    for command in splits {
        let Command::Split(split) = command else { continue };
        let Some(effective_date) = split.effective_date else { continue };

        let target_uid = tree_uid_for_tag(&split.target.site, &split.target.plot, &split.target.tag);
        let source_uid = resolver.resolve_tree_ref(&split.source, effective_date);

        let mut candidate_indices: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.tree_uid.as_deref() == Some(source_uid.as_str()))
            .map(|(i, _)| i)
            .collect();

        if let Some(filter) = split.selector.as_ref().and_then(|s| s.date_filter.as_ref()) {
            candidate_indices.retain(|&i| filter.matches(rows[i].date));
        }

        let strategy = split
            .selector
            .as_ref()
            .map(|s| s.strategy)
            .unwrap_or(SelectorStrategy::All);

        let selected: Vec<usize> = match strategy {
            SelectorStrategy::All => candidate_indices,
            SelectorStrategy::Largest => {
                pick_extreme(&candidate_indices, rows, |a, b| dbh_sort_key(a).cmp(&dbh_sort_key(b)))
            }
            SelectorStrategy::Smallest => {
                pick_extreme(&candidate_indices, rows, |a, b| dbh_sort_key(b).cmp(&dbh_sort_key(a)))
            }
            SelectorStrategy::Ranks => {
                let ranks = split.selector.as_ref().map(|s| s.ranks.clone()).unwrap_or_default();
                pick_ranks(&candidate_indices, rows, catalog, &ranks)
            }
        };

        for idx in selected {
            if rows[idx].date < effective_date {
                rows[idx].tree_uid = Some(target_uid.clone());
            }
        }
    }
}

fn pick_extreme(
    indices: &[usize],
    rows: &[MeasurementRow],
    cmp: impl Fn(&MeasurementRow, &MeasurementRow) -> std::cmp::Ordering,
) -> Vec<usize> {
    indices
        .iter()
        .copied()
        .min_by(|&a, &b| cmp(&rows[a], &rows[b]))
        .into_iter()
        .collect()
}

fn pick_ranks(
    indices: &[usize],
    rows: &[MeasurementRow],
    catalog: &SurveyCatalog,
    ranks: &[u32],
) -> Vec<usize> {
    let mut by_survey: HashMap<String, Vec<usize>> = HashMap::new();
    for &idx in indices {
        if let Some(survey_id) = catalog.survey_for_date(rows[idx].date) {
            by_survey.entry(survey_id.to_string()).or_default().push(idx);
        }
    }

    let mut selected = Vec::new();
    for group in by_survey.values_mut() {
        group.sort_by(|&a, &b| dbh_sort_key(&rows[a]).cmp(&dbh_sort_key(&rows[b])));
        for &rank in ranks {
            if rank == 0 {
                continue;
            }
            if let Some(&idx) = group.get(rank as usize - 1) {
                selected.push(idx);
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(row_number: usize, dbh: i64, health: i64, date: &str) -> MeasurementRow {
        MeasurementRow {
            row_number,
            site: "BRNV".into(),
            plot: "H4".into(),
            tag: "112".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            dbh_mm: Some(dbh),
            health: Some(health),
            standing: Some(true),
            notes: None,
            genus: None,
            species: None,
            code: None,
            origin: crate::transactions::Origin::Field,
            flags: Vec::new(),
            raw: Default::default(),
            tree_uid: Some("source-uid".to_string()),
            public_tag: None,
            source_tx: "tx1".into(),
        }
    }

    #[test]
    fn largest_picks_max_dbh() {
        let rows = vec![row(1, 171, 9, "2019-06-16"), row(2, 95, 7, "2019-06-16")];
        let indices = vec![0, 1];
        let selected = pick_extreme(&indices, &rows, |a, b| dbh_sort_key(a).cmp(&dbh_sort_key(b)));
        assert_eq!(selected, vec![0]);
    }

    #[test]
    fn smallest_picks_min_dbh() {
        let rows = vec![row(1, 171, 9, "2019-06-16"), row(2, 95, 7, "2019-06-16")];
        let indices = vec![0, 1];
        let selected = pick_extreme(&indices, &rows, |a, b| dbh_sort_key(b).cmp(&dbh_sort_key(a)));
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn smallest_tie_break_favors_largest_row_number() {
        let rows = vec![row(1, 100, 5, "2019-06-16"), row(2, 100, 5, "2019-06-16")];
        let indices = vec![0, 1];
        let selected = pick_extreme(&indices, &rows, |a, b| dbh_sort_key(b).cmp(&dbh_sort_key(a)));
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn missing_dbh_and_health_sort_as_zero_without_overflow() {
        let mut blank = row(1, 0, 0, "2019-06-16");
        blank.dbh_mm = None;
        blank.health = None;
        assert_eq!(dbh_sort_key(&blank), (0, 0, 1));
    }
}
