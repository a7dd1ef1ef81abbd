//! Accepts a transaction into the ledger: re-runs lint, blocks on any error,
//! appends observations and DSL lines, and cuts a new version snapshot.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::assembly::{
    assemble_observations, assign_tree_uids, build_alias_resolver, build_retag_suggestions,
    build_tree_view, generate_implied_rows, primary::PrimaryTimelines, properties::PropertyTimelines,
    split::apply_splits, SurveyCatalog,
};
use crate::config::{hash_config_files, load_config_bundle};
use crate::dsl::parse_document;
use crate::error::{ForestLedgerError, SubmitError};
use crate::ledger::{Ledger, TransactionEntry, ValidationSummary};
use crate::transactions::{load_transaction, normalize_measurements, NormalizationError};

use super::lint::lint_transaction;
use super::utils::{determine_default_effective_date, with_default_effective};

fn to_submit_error(err: NormalizationError) -> SubmitError {
    match err {
        NormalizationError::Format(e) => SubmitError::Format(e),
        NormalizationError::Data(e) => SubmitError::Data(e),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub tx_id: String,
    pub accepted: bool,
    pub version_seq: Option<u32>,
    pub warnings: usize,
}

/// Runs the code version that goes into a transaction entry's provenance.
/// There is no build-time version-stamping step in this workspace, so the
/// crate's own package version stands in for it.
fn code_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn hash_transaction_inputs(tx_dir: &Path) -> std::io::Result<std::collections::BTreeMap<String, String>> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    fn collect(root: &Path, dir: &Path, out: &mut Vec<std::path::PathBuf>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                collect(root, &path, out)?;
            } else if path.is_file() {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    collect(tx_dir, tx_dir, &mut files)?;
    files.sort();

    let mut hashes = std::collections::BTreeMap::new();
    for relative in files {
        let mut file = std::fs::File::open(tx_dir.join(&relative))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        hashes.insert(relative.to_string_lossy().replace('\\', "/"), hex::encode(hasher.finalize()));
    }
    Ok(hashes)
}

/// Submits `transaction_dir` into the ledger rooted at `workspace`.
///
/// Re-lints first; any validation error aborts with [`SubmitError::LintFailed`]
/// and writes nothing. A transaction id already present in the ledger is
/// treated as an idempotent no-op (`accepted: false`), not an error.
pub fn submit_transaction(
    transaction_dir: &Path,
    config_dir: &Path,
    workspace: &Path,
) -> Result<SubmitResult, ForestLedgerError> {
    let lint_report = lint_transaction(transaction_dir, config_dir)?;
    if lint_report.has_errors() {
        return Err(SubmitError::LintFailed(lint_report.error_count()).into());
    }

    let config = load_config_bundle(config_dir).map_err(SubmitError::Config)?;
    let tx_data = load_transaction(transaction_dir).map_err(SubmitError::Format)?;
    let tx_id = lint_report.tx_id.clone();

    let mut measurements =
        normalize_measurements(&tx_data.measurements_csv, &tx_id).map_err(to_submit_error)?;
    let mut commands = parse_document(&tx_data.updates_tdl).map_err(SubmitError::DslParse)?;
    let default_effective =
        determine_default_effective_date(&config, &tx_data.survey_meta, &measurements)
            .map_err(SubmitError::EffectiveDate)?;
    commands = with_default_effective(&commands, default_effective);

    let resolver = build_alias_resolver(&measurements, &commands);
    assign_tree_uids(&mut measurements, &resolver);
    let catalog = SurveyCatalog::from_config(&config.surveys);
    apply_splits(&mut measurements, &commands, &resolver, &catalog);

    let properties = PropertyTimelines::build(&commands, &resolver);
    properties.apply(&mut measurements);
    let primaries = PrimaryTimelines::build(&commands, &resolver);
    primaries.apply(&mut measurements);

    let ledger = Ledger::new(workspace);
    if ledger.has_transaction(&tx_id).map_err(SubmitError::Ledger)? {
        return Ok(SubmitResult {
            tx_id,
            accepted: false,
            version_seq: None,
            warnings: lint_report.warning_count(),
        });
    }

    let implied_rows =
        generate_implied_rows(&measurements, &catalog, config.validation.drop_after_absent_surveys);
    measurements.extend(implied_rows);

    let new_observations = assemble_observations(&measurements, &catalog);

    let mut existing_observations = ledger.load_existing_observations().map_err(SubmitError::Ledger)?;
    for row in existing_observations.iter_mut() {
        if let Ok(date) = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") {
            if let Some(tag) = primaries.resolve_tag_for(&row.tree_uid, date) {
                row.public_tag = tag.to_string();
            }
        }
    }

    let full_history: Vec<_> = existing_observations
        .iter()
        .map(|r| r.to_measurement_row())
        .chain(measurements.iter().cloned())
        .collect();
    let tree_view_rows = build_tree_view(&full_history, &catalog);
    let retag_rows = build_retag_suggestions(&full_history, &config);

    let mut all_observations = existing_observations;
    all_observations.extend(new_observations);
    let row_counts = ledger.write_observations(all_observations).map_err(SubmitError::Ledger)?;
    ledger.write_tree_view(&tree_view_rows).map_err(SubmitError::Ledger)?;
    ledger.write_retag_suggestions(&retag_rows).map_err(SubmitError::Ledger)?;
    ledger.write_validation_report(&lint_report.issues).map_err(SubmitError::Ledger)?;
    ledger.append_updates(&tx_data.updates_tdl).map_err(SubmitError::Ledger)?;

    let config_hashes = hash_config_files(config_dir).map_err(SubmitError::Config)?;
    let input_hashes = hash_transaction_inputs(transaction_dir).map_err(SubmitError::Ledger)?;
    let validation_summary = ValidationSummary::from_issues(&lint_report.issues);
    let dsl_lines_added = tx_data.updates_tdl.lines().filter(|l| !l.trim().is_empty()).count();

    let entry = TransactionEntry {
        tx_id: tx_id.clone(),
        accepted_at: Utc::now(),
        code_version: code_version(),
        config_hashes: config_hashes.clone(),
        input_hashes: input_hashes.clone(),
        rows_added: row_counts.values().sum(),
        dsl_lines_added,
        row_counts: row_counts.clone(),
        commands,
        validation_summary: validation_summary.clone(),
    };
    ledger.append_transaction_entry(&entry).map_err(SubmitError::Ledger)?;

    let version_seq = ledger
        .write_version(
            vec![tx_id.clone()],
            config_hashes,
            input_hashes,
            row_counts,
            validation_summary,
            Utc::now(),
        )
        .map_err(SubmitError::Ledger)?;

    Ok(SubmitResult {
        tx_id,
        accepted: true,
        version_seq: Some(version_seq),
        warnings: lint_report.warning_count(),
    })
}
