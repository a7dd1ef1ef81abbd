//! Emits synthetic "absent" rows for trailing survey gaps per tree, gated
//! by a configured threshold.

use std::collections::HashMap;

use crate::transactions::{MeasurementRow, Origin};

use super::survey::SurveyCatalog;

/// For each tree with any observation, if the number of surveys after its
/// last-observed survey is at least `drop_after_absent_surveys`, emits one
/// synthetic row anchored to the survey immediately after the last
/// presence. Trees re-observed after a gap do not generate implied rows —
/// only the tail since the tree's last real presence matters.
pub fn generate_implied_rows(
    rows: &[MeasurementRow],
    catalog: &SurveyCatalog,
    drop_after_absent_surveys: u32,
) -> Vec<MeasurementRow> {
    let mut last_index_by_tree: HashMap<String, usize> = HashMap::new();
    let mut last_row_by_tree: HashMap<String, &MeasurementRow> = HashMap::new();

    for row in rows {
        let Some(tree_uid) = row.tree_uid.as_ref() else { continue };
        let Some(survey_id) = catalog.survey_for_date(row.date) else { continue };
        let Some(idx) = catalog.index_of(survey_id) else { continue };

        let entry = last_index_by_tree.entry(tree_uid.clone()).or_insert(idx);
        if idx > *entry {
            *entry = idx;
        }

        let better_row = match last_row_by_tree.get(tree_uid) {
            Some(existing) => row.date >= existing.date,
            None => true,
        };
        if better_row {
            last_row_by_tree.insert(tree_uid.clone(), row);
        }
    }

    let total_surveys = catalog.len();
    let mut implied = Vec::new();
    let mut next_row_number = rows.iter().map(|r| r.row_number).max().unwrap_or(0) + 1;

    let mut tree_uids: Vec<&String> = last_index_by_tree.keys().collect();
    tree_uids.sort();

    for tree_uid in tree_uids {
        let last_index = last_index_by_tree[tree_uid];
        let absent_surveys = total_surveys.saturating_sub(last_index + 1);
        if (absent_surveys as u32) < drop_after_absent_surveys {
            continue;
        }
        let implied_index = last_index + 1;
        let Some(next_survey) = catalog.at(implied_index) else { continue };
        let basis = last_row_by_tree[tree_uid];

        implied.push(MeasurementRow {
            row_number: next_row_number,
            site: basis.site.clone(),
            plot: basis.plot.clone(),
            tag: basis.tag.clone(),
            date: next_survey.start,
            dbh_mm: None,
            health: Some(0),
            standing: Some(false),
            notes: None,
            genus: basis.genus.clone(),
            species: basis.species.clone(),
            code: basis.code.clone(),
            origin: Origin::Implied,
            flags: Vec::new(),
            raw: Default::default(),
            tree_uid: Some(tree_uid.clone()),
            public_tag: basis.public_tag.clone(),
            source_tx: basis.source_tx.clone(),
        });
        next_row_number += 1;
    }

    implied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurveyWindow;
    use crate::config::SurveysConfig;
    use chrono::NaiveDate;

    fn catalog(years: &[(&str, i32, i32)]) -> SurveyCatalog {
        let surveys = years
            .iter()
            .map(|(id, sy, ey)| SurveyWindow {
                id: id.to_string(),
                start: NaiveDate::from_ymd_opt(*sy, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(*ey, 12, 31).unwrap(),
            })
            .collect();
        SurveyCatalog::from_config(&SurveysConfig { surveys })
    }

    fn row(date: NaiveDate, tree_uid: &str) -> MeasurementRow {
        MeasurementRow {
            row_number: 1,
            site: "BRNV".into(),
            plot: "H4".into(),
            tag: "1".into(),
            date,
            dbh_mm: Some(100),
            health: Some(9),
            standing: Some(true),
            notes: None,
            genus: None,
            species: None,
            code: None,
            origin: Origin::Field,
            flags: Vec::new(),
            raw: Default::default(),
            tree_uid: Some(tree_uid.to_string()),
            public_tag: Some("1".to_string()),
            source_tx: "tx1".into(),
        }
    }

    #[test]
    fn emits_one_trailing_gap_row() {
        let catalog = catalog(&[
            ("2019", 2019, 2019),
            ("2020", 2020, 2020),
            ("2021", 2021, 2021),
            ("2022", 2022, 2022),
            ("2023", 2023, 2023),
            ("2024", 2024, 2024),
        ]);
        let rows = vec![
            row(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(), "tree-1"),
            row(NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(), "tree-1"),
        ];
        let implied = generate_implied_rows(&rows, &catalog, 2);
        assert_eq!(implied.len(), 1);
        assert_eq!(implied[0].date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(implied[0].dbh_mm, None);
        assert_eq!(implied[0].health, Some(0));
    }

    #[test]
    fn no_implied_row_when_gap_below_threshold() {
        let catalog = catalog(&[("2019", 2019, 2019), ("2020", 2020, 2020)]);
        let rows = vec![row(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap(), "tree-1")];
        let implied = generate_implied_rows(&rows, &catalog, 2);
        assert!(implied.is_empty());
    }
}
