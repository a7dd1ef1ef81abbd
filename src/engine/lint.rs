//! Lints a transaction directory against project configuration without
//! touching the ledger.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assembly::{
    assign_tree_uids, build_alias_resolver, build_retag_suggestions, build_tree_view,
    RetagSuggestion, SurveyCatalog, TreeViewRow,
};
use crate::assembly::{primary::PrimaryTimelines, properties::PropertyTimelines, split::apply_splits};
use crate::config::{load_config_bundle, ConfigBundle};
use crate::dsl::parse_document;
use crate::error::ForestLedgerError;
use crate::transactions::{compute_tx_id, load_transaction, normalize_measurements, MeasurementRow, NormalizationError};
use crate::validators::{sort_issues, validate_dsl_commands, validate_growth, validate_measurement_rows, ValidationIssue};

use super::utils::{determine_default_effective_date, with_default_effective};

fn to_forest_error(err: NormalizationError) -> ForestLedgerError {
    match err {
        NormalizationError::Format(e) => ForestLedgerError::Format(e),
        NormalizationError::Data(e) => ForestLedgerError::Data(e),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LintReport {
    pub transaction_path: PathBuf,
    pub tx_id: String,
    pub issues: Vec<ValidationIssue>,
    pub measurement_rows: Vec<MeasurementRow>,
    pub tree_view: Vec<TreeViewRow>,
    pub retag_suggestions: Vec<RetagSuggestion>,
}

impl LintReport {
    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len() - self.error_count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Assembles everything `submit` would (tree identity, splits, property and
/// primary timelines) and runs the full validator suite, without writing
/// anything to the ledger.
pub fn lint_transaction(transaction_dir: &Path, config_dir: &Path) -> Result<LintReport, ForestLedgerError> {
    let config: ConfigBundle = load_config_bundle(config_dir)?;
    let tx_data = load_transaction(transaction_dir)?;
    let tx_id = compute_tx_id(transaction_dir)?;

    let mut measurements =
        normalize_measurements(&tx_data.measurements_csv, &tx_id).map_err(to_forest_error)?;
    let mut commands = parse_document(&tx_data.updates_tdl)?;

    let default_effective = determine_default_effective_date(&config, &tx_data.survey_meta, &measurements)?;
    commands = with_default_effective(&commands, default_effective);

    let resolver = build_alias_resolver(&measurements, &commands);
    assign_tree_uids(&mut measurements, &resolver);

    let catalog = SurveyCatalog::from_config(&config.surveys);
    apply_splits(&mut measurements, &commands, &resolver, &catalog);

    let properties = PropertyTimelines::build(&commands, &resolver);
    properties.apply(&mut measurements);

    let primaries = PrimaryTimelines::build(&commands, &resolver);
    primaries.apply(&mut measurements);

    let mut issues = validate_measurement_rows(&measurements, &config, &catalog);
    issues.extend(validate_growth(&measurements, &config));
    issues.extend(validate_dsl_commands(&commands));
    sort_issues(&mut issues);

    let tree_view = build_tree_view(&measurements, &catalog);
    let retag_suggestions = build_retag_suggestions(&measurements, &config);

    Ok(LintReport {
        transaction_path: transaction_dir.to_path_buf(),
        tx_id,
        issues,
        measurement_rows: measurements,
        tree_view,
        retag_suggestions,
    })
}
