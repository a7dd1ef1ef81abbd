//! Per-row structural and taxonomic checks.

use crate::config::ConfigBundle;
use crate::transactions::{MeasurementRow, Origin};

use super::issues::ValidationIssue;
use crate::assembly::SurveyCatalog;

pub fn validate_measurement_rows(
    rows: &[MeasurementRow],
    config: &ConfigBundle,
    catalog: &SurveyCatalog,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for row in rows {
        let location = format!("{}/{}/{}:{}", row.site, row.plot, row.tag, row.date);

        if let Some(dbh) = row.dbh_mm {
            if dbh < 0 {
                issues.push(ValidationIssue::error(
                    "E_ROW_DBH_NEG",
                    format!("dbh_mm must be >= 0, got {dbh}"),
                    location.clone(),
                ));
            }
        } else if row.origin != Origin::Implied {
            issues.push(ValidationIssue::error(
                "E_ROW_DBH_NA_NOT_IMPLIED",
                "dbh_mm is missing on a non-implied row".to_string(),
                location.clone(),
            ));
        }

        if let Some(health) = row.health {
            if !(0..=10).contains(&health) {
                issues.push(ValidationIssue::error(
                    "E_ROW_HEALTH_RANGE",
                    format!("health must be within [0,10], got {health}"),
                    location.clone(),
                ));
            }
        }

        if !config.sites.knows(&row.site, &row.plot) {
            issues.push(ValidationIssue::error(
                "E_ROW_SITE_OR_PLOT_UNKNOWN",
                format!("{}/{} is not a configured site/plot", row.site, row.plot),
                location.clone(),
            ));
        }

        if catalog.survey_for_date(row.date).is_none() {
            issues.push(ValidationIssue::error(
                "E_ROW_DATE_OUTSIDE_SURVEY",
                format!("{} falls outside every configured survey window", row.date),
                location.clone(),
            ));
        }

        let any_taxonomy_field = row.genus.is_some() || row.species.is_some() || row.code.is_some();
        match (row.genus.as_deref(), row.species.as_deref()) {
            (Some(genus), Some(species)) => {
                if !config.taxonomy.contains_pair(genus, species) {
                    issues.push(ValidationIssue::error(
                        "E_ROW_TAXONOMY_MISMATCH",
                        format!("{genus} {species} is not a configured taxonomy entry"),
                        location.clone(),
                    ));
                } else if let Some(code) = row.code.as_deref() {
                    if Some(code) != config.taxonomy.code_for(genus, species) {
                        issues.push(ValidationIssue::error(
                            "E_ROW_TAXONOMY_MISMATCH",
                            format!("code {code} does not match {genus} {species}"),
                            location.clone(),
                        ));
                    }
                }
            }
            _ if any_taxonomy_field => {
                issues.push(ValidationIssue::error(
                    "E_ROW_TAXONOMY_MISMATCH",
                    "genus and species must both be provided when one is present".to_string(),
                    location.clone(),
                ));
            }
            _ => {}
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::SurveyCatalog;
    use crate::config::{
        ConfigBundle, DatasheetsConfig, SiteConfigRaw, SitesConfigRaw, SurveyWindow,
        SurveysConfigRaw, TaxonomyConfigRaw, ValidationConfig,
    };
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
            TaxonomyConfigRaw {
                species: vec![crate::config::models::SpeciesEntry {
                    genus: "Picea".into(),
                    species: "abies".into(),
                    code: "PICABI".into(),
                }],
                enforce_no_synonyms: true,
            },
            SitesConfigRaw { sites },
            SurveysConfigRaw {
                surveys: vec![SurveyWindow {
                    id: "2019".into(),
                    start: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                    end: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap(),
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

    fn row() -> MeasurementRow {
        MeasurementRow {
            row_number: 1,
            site: "BRNV".into(),
            plot: "H4".into(),
            tag: "112".into(),
            date: NaiveDate::from_ymd_opt(2019, 6, 16).unwrap(),
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
            tree_uid: Some("tree-1".into()),
            public_tag: None,
            source_tx: "tx1".into(),
        }
    }

    #[test]
    fn genus_without_species_is_a_taxonomy_mismatch() {
        let config = config();
        let catalog = SurveyCatalog::from_config(&config.surveys);
        let mut r = row();
        r.genus = Some("Picea".into());
        let issues = validate_measurement_rows(&[r], &config, &catalog);
        assert!(issues.iter().any(|i| i.code == "E_ROW_TAXONOMY_MISMATCH"));
    }

    #[test]
    fn code_alone_is_a_taxonomy_mismatch() {
        let config = config();
        let catalog = SurveyCatalog::from_config(&config.surveys);
        let mut r = row();
        r.code = Some("PICABI".into());
        let issues = validate_measurement_rows(&[r], &config, &catalog);
        assert!(issues.iter().any(|i| i.code == "E_ROW_TAXONOMY_MISMATCH"));
    }

    #[test]
    fn full_known_taxonomy_triple_is_clean() {
        let config = config();
        let catalog = SurveyCatalog::from_config(&config.surveys);
        let mut r = row();
        r.genus = Some("Picea".into());
        r.species = Some("abies".into());
        r.code = Some("PICABI".into());
        let issues = validate_measurement_rows(&[r], &config, &catalog);
        assert!(issues.iter().all(|i| i.code != "E_ROW_TAXONOMY_MISMATCH"));
    }
}
