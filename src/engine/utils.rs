//! Shared helpers for engine workflows.

use chrono::NaiveDate;

use crate::assembly::SurveyCatalog;
use crate::config::ConfigBundle;
use crate::dsl::Command;
use crate::error::EffectiveDateError;
use crate::transactions::{MeasurementRow, SurveyMeta};

/// Determines the default `EFFECTIVE` date for commands that omit one.
///
/// Prefers an explicit `survey_meta.toml`: a known `survey_id` resolves to
/// that survey's start date, an unknown one falls back to its own `start`
/// field. Without survey metadata, every measurement row's date must map to
/// the same survey, and that survey's start date is used.
pub fn determine_default_effective_date(
    config: &ConfigBundle,
    survey_meta: &SurveyMeta,
    measurements: &[MeasurementRow],
) -> Result<NaiveDate, EffectiveDateError> {
    let catalog = SurveyCatalog::from_config(&config.surveys);

    if let Some(survey_id) = survey_meta.survey_id.as_deref() {
        if let Some(record) = catalog.get(survey_id) {
            return Ok(record.start);
        }
        if let Some(start) = survey_meta.start {
            return Ok(start);
        }
        return Err(EffectiveDateError::UnknownSurveyId(survey_id.to_string()));
    }

    let mut survey_ids = std::collections::BTreeSet::new();
    for row in measurements {
        match catalog.survey_for_date(row.date) {
            Some(id) => {
                survey_ids.insert(id.to_string());
            }
            None => return Err(EffectiveDateError::UnknownSurveyId(row.date.to_string())),
        }
    }

    match survey_ids.len() {
        0 => Err(EffectiveDateError::AmbiguousSurveyCount(0)),
        1 => {
            let id = survey_ids.into_iter().next().unwrap();
            Ok(catalog.get(&id).expect("id was just resolved from the catalog").start)
        }
        n => Err(EffectiveDateError::AmbiguousSurveyCount(n)),
    }
}

/// Fills in `effective_date` on every command that doesn't already specify one.
pub fn with_default_effective(commands: &[Command], default_date: NaiveDate) -> Vec<Command> {
    commands
        .iter()
        .map(|command| {
            if command.effective_date().is_none() {
                command.with_effective_date(default_date)
            } else {
                command.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConfigBundle, DatasheetsConfig, SiteConfigRaw, SitesConfigRaw, SurveyWindow,
        SurveysConfigRaw, TaxonomyConfigRaw, ValidationConfig,
    };
    use crate::transactions::Origin;
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
            TaxonomyConfigRaw {
                species: vec![],
                enforce_no_synonyms: true,
            },
            SitesConfigRaw { sites },
            SurveysConfigRaw {
                surveys: vec![SurveyWindow {
                    id: "2024".into(),
                    start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
                }],
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

    fn row(date: &str) -> MeasurementRow {
        MeasurementRow {
            row_number: 1,
            site: "BRNV".into(),
            plot: "H4".into(),
            tag: "112".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
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
            tree_uid: None,
            public_tag: None,
            source_tx: "tx1".into(),
        }
    }

    #[test]
    fn infers_start_from_single_survey_spanned_by_measurements() {
        let date = determine_default_effective_date(&config(), &SurveyMeta::default(), &[row("2024-06-01")]).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn prefers_explicit_survey_meta() {
        let meta = SurveyMeta {
            survey_id: Some("2024".into()),
            start: None,
        };
        let date = determine_default_effective_date(&config(), &meta, &[]).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
