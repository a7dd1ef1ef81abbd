//! Cross-survey growth validation, grouped by the raw `(site, plot, tag)`
//! triple rather than by resolved `tree_uid` — deliberately so, matching
//! what the source system checks: successive real-world stems reported
//! under the same field label, not the same identity assignment.

use std::collections::HashMap;

use crate::assembly::SurveyCatalog;
use crate::config::ConfigBundle;
use crate::transactions::MeasurementRow;

use super::issues::ValidationIssue;

type TreeKey = (String, String, String);

#[derive(Debug, Clone)]
struct SurveyRecord {
    survey_id: String,
    max_dbh_mm: Option<i64>,
}

fn growth_location(key: &TreeKey, survey_id: &str) -> String {
    format!("growth:{}/{}/{}:{}", key.0, key.1, key.2, survey_id)
}

pub fn validate_growth(rows: &[MeasurementRow], config: &ConfigBundle) -> Vec<ValidationIssue> {
    let catalog = SurveyCatalog::from_config(&config.surveys);
    let mut history: HashMap<TreeKey, HashMap<String, SurveyRecord>> = HashMap::new();

    for row in rows {
        let Some(survey_id) = catalog.survey_for_date(row.date) else { continue };
        let key = (row.site.clone(), row.plot.clone(), row.tag.clone());
        let per_survey = history.entry(key).or_default();
        match per_survey.get_mut(survey_id) {
            None => {
                per_survey.insert(
                    survey_id.to_string(),
                    SurveyRecord {
                        survey_id: survey_id.to_string(),
                        max_dbh_mm: row.dbh_mm,
                    },
                );
            }
            Some(existing) => {
                if let Some(dbh) = row.dbh_mm {
                    if existing.max_dbh_mm.map(|m| dbh > m).unwrap_or(true) {
                        existing.max_dbh_mm = Some(dbh);
                    }
                }
            }
        }
    }

    let warn_pct = config.validation.dbh_pct_warn;
    let warn_abs = config.validation.dbh_abs_floor_warn_mm;
    let err_pct = config.validation.dbh_pct_error;
    let err_abs = config.validation.dbh_abs_floor_error_mm;

    let ordered_ids: Vec<&str> = catalog.ordered_surveys().map(|s| s.id.as_str()).collect();

    let mut issues = Vec::new();
    let mut keys: Vec<&TreeKey> = history.keys().collect();
    keys.sort();

    for key in keys {
        let per_survey = &history[key];
        let sorted_history: Vec<&SurveyRecord> = ordered_ids
            .iter()
            .filter_map(|id| per_survey.get(*id))
            .collect();

        let mut previous: Option<&SurveyRecord> = None;
        for record in sorted_history {
            let Some(prev) = previous else {
                previous = Some(record);
                continue;
            };
            let (Some(prev_dbh), Some(curr_dbh)) = (prev.max_dbh_mm, record.max_dbh_mm) else {
                previous = Some(record);
                continue;
            };
            let delta = (curr_dbh - prev_dbh).abs();
            if delta == 0 {
                previous = Some(record);
                continue;
            }
            let pct_change = delta as f64 / (prev_dbh.max(curr_dbh) as f64);
            let location = growth_location(key, &record.survey_id);

            if pct_change >= err_pct && delta >= err_abs {
                issues.push(ValidationIssue::error(
                    "E_DBH_GROWTH_ERROR",
                    format!(
                        "dbh change {delta}mm ({:.2}%) between {} and {} exceeds error threshold",
                        pct_change * 100.0,
                        prev.survey_id,
                        record.survey_id
                    ),
                    location,
                ));
            } else if pct_change >= warn_pct && delta >= warn_abs {
                issues.push(ValidationIssue::warning(
                    "W_DBH_GROWTH_WARN",
                    format!(
                        "dbh change {delta}mm ({:.2}%) between {} and {} exceeds warning threshold",
                        pct_change * 100.0,
                        prev.survey_id,
                        record.survey_id
                    ),
                    location,
                ));
            }
            previous = Some(record);
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConfigBundle, DatasheetsConfig, SiteConfigRaw, SitesConfigRaw, SurveyWindow,
        SurveysConfig as SurveysCfg, TaxonomyConfig, ValidationConfig,
    };
    use crate::transactions::Origin;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn config() -> ConfigBundle {
        let mut sites = BTreeMap::new();
        sites.insert(
            "BRNV".to_string(),
            SiteConfigRaw {
                zone_order: vec!["H4".to_string()],
                plots: vec!["H4".to_string()],
                girdling: BTreeMap::new(),
            },
        );
        ConfigBundle::validate(
            crate::config::models::TaxonomyConfigRaw {
                species: vec![],
                enforce_no_synonyms: true,
            },
            SitesConfigRaw { sites },
            crate::config::models::SurveysConfigRaw {
                surveys: vec![
                    SurveyWindow {
                        id: "S1".into(),
                        start: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                        end: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
                    },
                    SurveyWindow {
                        id: "S2".into(),
                        start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                        end: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
                    },
                ],
            },
            ValidationConfig {
                rounding: "half_up".into(),
                dbh_pct_warn: 0.08,
                dbh_pct_error: 0.16,
                dbh_abs_floor_warn_mm: 3,
                dbh_abs_floor_error_mm: 6,
                retag_delta_pct: 0.1,
                new_tree_flag_min_dbh_mm: 50,
                drop_after_absent_surveys: 2,
            },
            DatasheetsConfig {
                show_previous_surveys: 2,
                sort: "public_tag_numeric_asc".into(),
                show_zombie_asterisk: true,
            },
        )
        .unwrap()
    }

    fn row(date: &str, dbh: i64) -> MeasurementRow {
        MeasurementRow {
            row_number: 1,
            site: "BRNV".into(),
            plot: "H4".into(),
            tag: "112".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            dbh_mm: Some(dbh),
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
    fn growth_warning_within_thresholds() {
        // delta=10, pct=10/110=0.0909: clears warn (0.08/3mm) but stays
        // below the error thresholds (0.16/6mm).
        let rows = vec![row("2019-06-01", 100), row("2020-06-01", 110)];
        let issues = validate_growth(&rows, &config());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "W_DBH_GROWTH_WARN");
    }
}
