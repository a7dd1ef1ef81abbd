//! Rebuilds a version snapshot from the ledger's accumulated transaction
//! history, without requiring a new transaction submission.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::config::{hash_config_files, load_config_bundle};
use crate::error::BuildError;
use crate::ledger::{Ledger, ValidationSummary};

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub version_seq: u32,
    pub tx_count: usize,
}

/// Aggregates every recorded transaction's validation summary and cuts a new
/// version snapshot from the ledger's current observation table, without
/// requiring a fresh transaction submission.
pub fn build_workspace(config_dir: &Path, workspace: &Path) -> Result<BuildResult, BuildError> {
    load_config_bundle(config_dir)?;
    let ledger = Ledger::new(workspace);

    if !ledger.observations_path().exists() {
        return Err(BuildError::NoObservations);
    }

    let entries = ledger.read_transactions().map_err(BuildError::Ledger)?;
    let tx_ids: Vec<String> = entries.iter().map(|e| e.tx_id.clone()).collect();
    if tx_ids.is_empty() {
        return Err(BuildError::NoObservations);
    }

    let mut validation_summary = ValidationSummary {
        errors: 0,
        warnings: 0,
        by_code: BTreeMap::new(),
    };
    for entry in &entries {
        validation_summary.merge(&entry.validation_summary);
    }

    let observations = ledger.load_existing_observations().map_err(BuildError::Ledger)?;
    let mut row_counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in &observations {
        *row_counts.entry(row.origin.clone()).or_insert(0) += 1;
    }

    let config_hashes = hash_config_files(config_dir)?;

    let version_seq = ledger
        .write_version(tx_ids.clone(), config_hashes, BTreeMap::new(), row_counts, validation_summary, Utc::now())
        .map_err(BuildError::Ledger)?;

    Ok(BuildResult {
        version_seq,
        tx_count: tx_ids.len(),
    })
}
