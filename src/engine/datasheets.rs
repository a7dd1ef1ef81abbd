//! Field datasheet scaffold generation: per-plot, per-survey JSON context
//! listing the trees expected to be re-measured and their recent history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::load_config_bundle;
use crate::error::DatasheetsError;
use crate::ledger::Ledger;
use crate::transactions::{MeasurementRow, Origin};

use crate::assembly::SurveyCatalog;

#[derive(Debug, Clone)]
pub struct DatasheetOptions {
    pub survey_id: String,
    pub site: String,
    pub plot: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
struct Stem {
    rank: usize,
    dbh_mm: Option<i64>,
    health: Option<i64>,
    standing: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
struct StemWithNotes {
    rank: usize,
    dbh_mm: Option<i64>,
    health: Option<i64>,
    standing: Option<bool>,
    notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct TreeEntry {
    tree_uid: String,
    public_tag: String,
    zombie_ever: bool,
    stems_next: Vec<StemWithNotes>,
    dhs1: Vec<Stem>,
    dhs1_marked: bool,
    dhs2: Vec<Stem>,
    dhs2_marked: bool,
}

#[derive(Debug, Clone, Serialize)]
struct DatasheetContext {
    survey_id: String,
    site: String,
    plot: String,
    tags_used: Vec<String>,
    trees: Vec<TreeEntry>,
    previous_surveys: Vec<String>,
}

/// Sort key that orders purely numeric tags numerically and falls back to
/// lexical ordering for anything else — `2` sorts before `10`, but `10A`
/// still sorts after every plain number.
fn tag_sort_key(tag: &str) -> (u8, i64, String) {
    match tag.parse::<i64>() {
        Ok(n) => (0, n, String::new()),
        Err(_) => (1, 0, tag.to_string()),
    }
}

/// Generates a datasheet scaffold for `options.site`/`options.plot` at
/// `options.survey_id`, writing `context_<site>_<plot>_<survey>.json` under
/// `options.output_dir` and returning that path.
pub fn generate_datasheet(
    config_dir: &Path,
    workspace: &Path,
    options: &DatasheetOptions,
) -> Result<PathBuf, DatasheetsError> {
    let config = load_config_bundle(config_dir)?;
    let ledger = Ledger::new(workspace);

    let observations = ledger.load_existing_observations().map_err(DatasheetsError::Ledger)?;
    if observations.is_empty() {
        return Err(DatasheetsError::EmptySite(options.site.clone()));
    }
    let rows: Vec<MeasurementRow> = observations.iter().map(|o| o.to_measurement_row()).collect();

    let catalog = SurveyCatalog::from_config(&config.surveys);
    let ordered_ids: Vec<String> = catalog.ordered_surveys().map(|s| s.id.clone()).collect();
    let survey_index = ordered_ids
        .iter()
        .position(|id| id == &options.survey_id)
        .ok_or_else(|| DatasheetsError::UnknownSurveyId(options.survey_id.clone()))?;

    let previous_ids: Vec<String> = [survey_index.checked_sub(1), survey_index.checked_sub(2)]
        .into_iter()
        .flatten()
        .filter_map(|idx| ordered_ids.get(idx).cloned())
        .collect();
    if previous_ids.is_empty() {
        return Err(DatasheetsError::UnknownSurveyId(format!(
            "{} has no prior surveys",
            options.survey_id
        )));
    }

    let target_record = catalog
        .get(&options.survey_id)
        .ok_or_else(|| DatasheetsError::UnknownSurveyId(options.survey_id.clone()))?;
    let target_end = target_record.end;

    let filtered: Vec<&MeasurementRow> = rows
        .iter()
        .filter(|row| {
            row.tree_uid.is_some()
                && row.site == options.site
                && row.plot == options.plot
                && catalog.survey_for_date(row.date).is_some()
        })
        .collect();
    if filtered.is_empty() {
        return Err(DatasheetsError::EmptySite(options.site.clone()));
    }

    let mut tags_used: Vec<String> = filtered
        .iter()
        .filter(|row| row.origin != Origin::Implied)
        .map(|row| row.public_tag.clone().unwrap_or_else(|| row.tag.clone()))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    tags_used.sort_by_key(|t| tag_sort_key(t));

    let mut trees = prepare_trees(&filtered, &catalog, &ordered_ids, &previous_ids, target_end);
    if trees.is_empty() {
        return Err(DatasheetsError::EmptySite(format!(
            "no eligible trees in {}/{} for {}",
            options.site, options.plot, options.survey_id
        )));
    }
    trees.sort_by_key(|t| tag_sort_key(&t.public_tag));

    let context = DatasheetContext {
        survey_id: options.survey_id.clone(),
        site: options.site.clone(),
        plot: options.plot.clone(),
        tags_used,
        trees,
        previous_surveys: previous_ids,
    };

    std::fs::create_dir_all(&options.output_dir).map_err(DatasheetsError::Ledger)?;
    let filename = format!("context_{}_{}_{}.json", options.site, options.plot, options.survey_id);
    let output_path = options.output_dir.join(filename);
    let text = serde_json::to_string_pretty(&context)
        .map_err(|e| DatasheetsError::Ledger(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    std::fs::write(&output_path, format!("{text}\n")).map_err(DatasheetsError::Ledger)?;
    Ok(output_path)
}

fn prepare_trees(
    rows: &[&MeasurementRow],
    catalog: &SurveyCatalog,
    ordered_ids: &[String],
    previous_ids: &[String],
    target_end: NaiveDate,
) -> Vec<TreeEntry> {
    let mut per_tree: HashMap<String, HashMap<String, Vec<&MeasurementRow>>> = HashMap::new();
    for &row in rows {
        let Some(survey_id) = catalog.survey_for_date(row.date) else { continue };
        let tree_uid = row.tree_uid.clone().unwrap();
        per_tree
            .entry(tree_uid)
            .or_default()
            .entry(survey_id.to_string())
            .or_default()
            .push(row);
    }

    let mut entries = Vec::new();
    let mut tree_uids: Vec<&String> = per_tree.keys().collect();
    tree_uids.sort();

    for tree_uid in tree_uids {
        let survey_map = &per_tree[tree_uid];
        if !has_real_rows(survey_map, previous_ids) {
            continue;
        }

        let public_tag = public_tag_as_of(survey_map, target_end);
        let zombie_ever = compute_zombie_flag(survey_map, ordered_ids);

        let prev1_rows = load_rows_for_survey(survey_map, previous_ids.first());
        let prev2_rows = load_rows_for_survey(survey_map, previous_ids.get(1));
        let stems_source = if !prev1_rows.is_empty() { &prev1_rows } else { &prev2_rows };

        entries.push(TreeEntry {
            tree_uid: tree_uid.clone(),
            public_tag,
            zombie_ever,
            stems_next: format_stems_with_notes(stems_source),
            dhs1_marked: !prev1_rows.is_empty(),
            dhs1: format_stems(&prev1_rows),
            dhs2_marked: !prev2_rows.is_empty(),
            dhs2: format_stems(&prev2_rows),
        });
    }

    entries
}

fn has_real_rows(survey_map: &HashMap<String, Vec<&MeasurementRow>>, survey_ids: &[String]) -> bool {
    survey_ids.iter().any(|id| {
        survey_map
            .get(id)
            .map(|rows| rows.iter().any(|r| r.origin != Origin::Implied))
            .unwrap_or(false)
    })
}

fn public_tag_as_of(survey_map: &HashMap<String, Vec<&MeasurementRow>>, target_end: NaiveDate) -> String {
    let mut candidates: Vec<&&MeasurementRow> =
        survey_map.values().flatten().filter(|r| r.date <= target_end).collect();
    if candidates.is_empty() {
        candidates = survey_map.values().flatten().collect();
    }
    candidates.sort_by_key(|r| (r.date, r.origin != Origin::Implied));
    match candidates.last() {
        Some(row) => row.public_tag.clone().unwrap_or_else(|| row.tag.clone()),
        None => String::new(),
    }
}

fn compute_zombie_flag(survey_map: &HashMap<String, Vec<&MeasurementRow>>, ordered_ids: &[String]) -> bool {
    let mut seen_dead = false;
    for survey_id in ordered_ids {
        let rows: Vec<&&MeasurementRow> = survey_map
            .get(survey_id)
            .into_iter()
            .flatten()
            .filter(|r| r.origin != Origin::Implied)
            .collect();
        if rows.is_empty() {
            continue;
        }
        let alive = rows.iter().any(|r| r.health.unwrap_or(0) > 0);
        if !alive {
            seen_dead = true;
        } else if seen_dead {
            return true;
        }
    }
    false
}

fn load_rows_for_survey<'a>(
    survey_map: &HashMap<String, Vec<&'a MeasurementRow>>,
    survey_id: Option<&String>,
) -> Vec<&'a MeasurementRow> {
    let Some(survey_id) = survey_id else { return Vec::new() };
    let mut rows: Vec<&MeasurementRow> = survey_map
        .get(survey_id)
        .into_iter()
        .flatten()
        .filter(|r| r.origin != Origin::Implied)
        .copied()
        .collect();
    rows.sort_by_key(|r| (-r.dbh_mm.unwrap_or(-1), -r.health.unwrap_or(-1), r.row_number));
    rows
}

fn format_stems(rows: &[&MeasurementRow]) -> Vec<Stem> {
    rows.iter()
        .enumerate()
        .map(|(idx, r)| Stem {
            rank: idx + 1,
            dbh_mm: r.dbh_mm,
            health: r.health,
            standing: r.standing,
        })
        .collect()
}

fn format_stems_with_notes(rows: &[&MeasurementRow]) -> Vec<StemWithNotes> {
    rows.iter()
        .enumerate()
        .map(|(idx, r)| StemWithNotes {
            rank: idx + 1,
            dbh_mm: r.dbh_mm,
            health: r.health,
            standing: r.standing,
            notes: r.notes.clone(),
        })
        .collect()
}
