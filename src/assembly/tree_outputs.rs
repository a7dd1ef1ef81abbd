//! Derived per-tree views: the canonical tree view and cross-survey retag
//! suggestions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigBundle;
use crate::transactions::{MeasurementRow, Origin};

use super::survey::SurveyCatalog;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeViewRow {
    pub tree_uid: String,
    pub survey_id: String,
    pub public_tag: String,
    pub site: String,
    pub plot: String,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub code: Option<String>,
    pub origin: String,
}

/// One row per `(tree_uid, survey_id)`, the best candidate selected by
/// priority `(origin != implied, date)` — real rows beat implied rows,
/// later dates beat earlier ones. `public_tag` here is deliberately the
/// row's raw `tag` field, not its resolved `public_tag` — the tree view
/// reports what was literally observed that survey.
pub fn build_tree_view(rows: &[MeasurementRow], catalog: &SurveyCatalog) -> Vec<TreeViewRow> {
    let mut selected: HashMap<(String, String), &MeasurementRow> = HashMap::new();

    for row in rows {
        let Some(tree_uid) = row.tree_uid.as_ref() else { continue };
        let Some(survey_id) = catalog.survey_for_date(row.date) else { continue };
        let key = (tree_uid.clone(), survey_id.to_string());
        match selected.get(&key) {
            None => {
                selected.insert(key, row);
            }
            Some(current) => {
                let current_priority = (current.origin != Origin::Implied, current.date);
                let new_priority = (row.origin != Origin::Implied, row.date);
                if new_priority > current_priority {
                    selected.insert(key, row);
                }
            }
        }
    }

    let mut records: Vec<TreeViewRow> = selected
        .into_iter()
        .map(|((tree_uid, survey_id), row)| TreeViewRow {
            tree_uid,
            survey_id,
            public_tag: row.tag.clone(),
            site: row.site.clone(),
            plot: row.plot.clone(),
            genus: row.genus.clone(),
            species: row.species.clone(),
            code: row.code.clone(),
            origin: row.origin.as_str().to_string(),
        })
        .collect();

    records.sort_by(|a, b| {
        (&a.survey_id, &a.site, &a.plot, &a.public_tag).cmp(&(
            &b.survey_id,
            &b.site,
            &b.plot,
            &b.public_tag,
        ))
    });
    records
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetagSuggestion {
    pub survey_id: String,
    pub plot: String,
    pub lost_tree_uid: String,
    pub lost_public_tag: String,
    pub lost_max_dbh_mm: i64,
    pub new_tree_uid: String,
    pub new_public_tag: String,
    pub new_max_dbh_mm: i64,
    pub delta_mm: i64,
    pub delta_pct: f64,
    pub suggested_alias_line: String,
}

fn max_by_dbh_then_health<'a>(rows: &[&'a MeasurementRow]) -> &'a MeasurementRow {
    rows.iter()
        .copied()
        .max_by_key(|r| (r.dbh_mm.unwrap_or(0), r.health.unwrap_or(0)))
        .expect("rows must be non-empty")
}

/// For each pair of consecutive surveys, pairs every "lost" tree (had real
/// rows in the previous survey, none in the current one) with every "new"
/// tree (first observed in the current survey, with dbh over the
/// configured flag threshold), keeping pairs within `retag_delta_pct`.
pub fn build_retag_suggestions(rows: &[MeasurementRow], config: &ConfigBundle) -> Vec<RetagSuggestion> {
    let catalog = SurveyCatalog::from_config(&config.surveys);
    let surveys: Vec<_> = catalog.ordered_surveys().cloned().collect();
    if surveys.len() < 2 {
        return Vec::new();
    }

    let threshold_dbh = config.validation.new_tree_flag_min_dbh_mm;
    let delta_pct = config.validation.retag_delta_pct;

    let mut by_tree: HashMap<String, HashMap<String, Vec<&MeasurementRow>>> = HashMap::new();
    let mut first_seen: HashMap<String, String> = HashMap::new();

    for row in rows {
        let Some(tree_uid) = row.tree_uid.as_ref() else { continue };
        if row.origin == Origin::Implied {
            continue;
        }
        let Some(survey_id) = catalog.survey_for_date(row.date) else { continue };
        by_tree
            .entry(tree_uid.clone())
            .or_default()
            .entry(survey_id.to_string())
            .or_default()
            .push(row);
        first_seen
            .entry(tree_uid.clone())
            .or_insert_with(|| survey_id.to_string());
    }

    let mut suggestions = Vec::new();

    for idx in 1..surveys.len() {
        let prev_survey = &surveys[idx - 1].id;
        let curr_survey = &surveys[idx].id;
        let curr_start = surveys[idx].start;

        let mut lost_entries: Vec<(String, &MeasurementRow)> = Vec::new();
        let mut new_entries: Vec<(String, &MeasurementRow)> = Vec::new();

        for (tree_uid, survey_rows) in &by_tree {
            let prev_rows = survey_rows.get(prev_survey);
            let curr_rows = survey_rows.get(curr_survey);

            if let (Some(prev_rows), None) = (prev_rows, curr_rows) {
                lost_entries.push((tree_uid.clone(), max_by_dbh_then_health(prev_rows)));
            }

            if let (None, Some(curr_rows)) = (prev_rows, curr_rows) {
                if first_seen.get(tree_uid) == Some(curr_survey) {
                    let new_row = max_by_dbh_then_health(curr_rows);
                    if new_row.dbh_mm.unwrap_or(0) >= threshold_dbh {
                        new_entries.push((tree_uid.clone(), new_row));
                    }
                }
            }
        }

        for (lost_tree_uid, lost_row) in &lost_entries {
            for (new_tree_uid, new_row) in &new_entries {
                if lost_row.site != new_row.site || lost_row.plot != new_row.plot {
                    continue;
                }
                let lost_dbh = lost_row.dbh_mm.unwrap_or(0);
                let new_dbh = new_row.dbh_mm.unwrap_or(0);
                if lost_dbh == 0 || new_dbh == 0 {
                    continue;
                }
                let delta = (lost_dbh - new_dbh).abs();
                let allowed = delta_pct * (lost_dbh.max(new_dbh) as f64);
                if delta as f64 > allowed {
                    continue;
                }

                suggestions.push(RetagSuggestion {
                    survey_id: curr_survey.clone(),
                    plot: format!("{}/{}", new_row.site, new_row.plot),
                    lost_tree_uid: lost_tree_uid.clone(),
                    lost_public_tag: lost_row.tag.clone(),
                    lost_max_dbh_mm: lost_dbh,
                    new_tree_uid: new_tree_uid.clone(),
                    new_public_tag: new_row.tag.clone(),
                    new_max_dbh_mm: new_dbh,
                    delta_mm: delta,
                    delta_pct: (delta as f64 / (lost_dbh.max(new_dbh) as f64) * 10000.0).round() / 10000.0,
                    suggested_alias_line: format!(
                        "ALIAS {}/{}/{} TO {} PRIMARY EFFECTIVE {}",
                        new_row.site, new_row.plot, new_row.tag, lost_tree_uid, curr_start
                    ),
                });
            }
        }
    }

    suggestions.sort_by(|a, b| {
        (&a.survey_id, &a.plot, &a.new_public_tag).cmp(&(&b.survey_id, &b.plot, &b.new_public_tag))
    });
    suggestions
}
