//! Content-addressed ledger: the append-only transaction log, the canonical
//! observation table, derived views, and versioned snapshot directories.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::assembly::ObservationRow;
use crate::assembly::{RetagSuggestion, TreeViewRow};
use crate::dsl::Command;
use crate::validators::ValidationIssue;

const OBSERVATIONS_CSV: &str = "observations_long.csv";
const OBSERVATIONS_SNAPSHOT: &str = "observations_long.bin";
const UPDATES_LOG: &str = "updates_log.tdl";
const TREES_VIEW_CSV: &str = "trees_view.csv";
const RETAG_SUGGESTIONS_CSV: &str = "retag_suggestions.csv";
const VALIDATION_REPORT_JSON: &str = "validation_report.json";
const TRANSACTIONS_LOG: &str = "transactions.jsonl";
const VERSIONS_DIR: &str = "versions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub errors: usize,
    pub warnings: usize,
    pub by_code: BTreeMap<String, usize>,
}

impl ValidationSummary {
    pub fn from_issues(issues: &[ValidationIssue]) -> Self {
        let mut by_code = BTreeMap::new();
        let mut errors = 0;
        let mut warnings = 0;
        for issue in issues {
            *by_code.entry(issue.code.clone()).or_insert(0) += 1;
            if issue.is_error() {
                errors += 1;
            } else {
                warnings += 1;
            }
        }
        ValidationSummary {
            errors,
            warnings,
            by_code,
        }
    }

    pub fn merge(&mut self, other: &ValidationSummary) {
        self.errors += other.errors;
        self.warnings += other.warnings;
        for (code, count) in &other.by_code {
            *self.by_code.entry(code.clone()).or_insert(0) += count;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub tx_id: String,
    pub accepted_at: DateTime<Utc>,
    pub code_version: String,
    pub config_hashes: BTreeMap<String, String>,
    pub input_hashes: BTreeMap<String, String>,
    pub rows_added: usize,
    pub dsl_lines_added: usize,
    pub row_counts: BTreeMap<String, usize>,
    pub commands: Vec<Command>,
    pub validation_summary: ValidationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    pub version_seq: u32,
    pub created_at: DateTime<Utc>,
    pub tx_ids: Vec<String>,
    pub config_hashes: BTreeMap<String, String>,
    pub input_hashes: BTreeMap<String, String>,
    pub artifact_checksums: BTreeMap<String, String>,
    pub artifact_sizes: BTreeMap<String, u64>,
    pub row_counts: BTreeMap<String, usize>,
    pub validation_summary: ValidationSummary,
}

pub struct Ledger {
    root: PathBuf,
}

impl Ledger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Ledger { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn observations_path(&self) -> PathBuf {
        self.root.join(OBSERVATIONS_CSV)
    }

    /// Scans the transaction log for `tx_id`. O(n) but bounded by accepted
    /// transaction count.
    pub fn has_transaction(&self, tx_id: &str) -> std::io::Result<bool> {
        Ok(self.read_transactions()?.iter().any(|e| e.tx_id == tx_id))
    }

    pub fn read_transactions(&self) -> std::io::Result<Vec<TransactionEntry>> {
        let path = self.root.join(TRANSACTIONS_LOG);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransactionEntry = serde_json::from_str(&line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn append_transaction_entry(&self, entry: &TransactionEntry) -> std::io::Result<()> {
        self.ensure_root()?;
        let path = self.root.join(TRANSACTIONS_LOG);
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{line}")
    }

    pub fn append_updates(&self, dsl_text: &str) -> std::io::Result<()> {
        self.ensure_root()?;
        let path = self.root.join(UPDATES_LOG);
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        if !dsl_text.is_empty() {
            writeln!(file, "{}", dsl_text.trim_end())?;
        }
        Ok(())
    }

    pub fn load_existing_observations(&self) -> std::io::Result<Vec<ObservationRow>> {
        let path = self.observations_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let row: ObservationRow =
                result.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Writes the full observation table (CSV plus a deterministic binary
    /// snapshot), stable-sorted by `(survey_id, site, plot, tag, obs_id)`,
    /// and returns the per-origin row counts.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub fn write_observations(&self, mut rows: Vec<ObservationRow>) -> std::io::Result<BTreeMap<String, usize>> {
        self.ensure_root()?;
        rows.sort_by(|a, b| {
            (&a.survey_id, &a.site, &a.plot, &a.tag, &a.obs_id).cmp(&(
                &b.survey_id,
                &b.site,
                &b.plot,
                &b.tag,
                &b.obs_id,
            ))
        });

        let mut row_counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in &rows {
            *row_counts.entry(row.origin.clone()).or_insert(0) += 1;
        }

        let mut writer = csv::Writer::from_path(self.observations_path())?;
        for row in &rows {
            writer
                .serialize(row)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        }
        writer.flush()?;

        let encoded = bincode::serialize(&rows)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(self.root.join(OBSERVATIONS_SNAPSHOT), encoded)?;

        Ok(row_counts)
    }

    pub fn write_tree_view(&self, rows: &[TreeViewRow]) -> std::io::Result<()> {
        self.ensure_root()?;
        let mut writer = csv::Writer::from_path(self.root.join(TREES_VIEW_CSV))?;
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        }
        writer.flush()
    }

    pub fn write_retag_suggestions(&self, rows: &[RetagSuggestion]) -> std::io::Result<()> {
        self.ensure_root()?;
        let mut writer = csv::Writer::from_path(self.root.join(RETAG_SUGGESTIONS_CSV))?;
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        }
        writer.flush()
    }

    pub fn write_validation_report(&self, issues: &[ValidationIssue]) -> std::io::Result<()> {
        self.ensure_root()?;
        let text = serde_json::to_string_pretty(issues)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(self.root.join(VALIDATION_REPORT_JSON), text)
    }

    fn versions_root(&self) -> PathBuf {
        self.root.join(VERSIONS_DIR)
    }

    pub fn list_versions(&self) -> std::io::Result<Vec<u32>> {
        let dir = self.versions_root();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut seqs: Vec<u32> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().to_str().and_then(|s| s.parse::<u32>().ok()))
            .collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    pub fn load_manifest(&self, seq: u32) -> std::io::Result<Option<VersionManifest>> {
        let path = self.versions_root().join(format!("{seq:04}")).join("manifest.json");
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map(Some).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Computes the next sequence, copies the current artefacts into
    /// `versions/NNNN/`, hashes each, and writes a sorted-key manifest.
    #[instrument(skip(self, config_hashes, input_hashes, validation_summary))]
    pub fn write_version(
        &self,
        tx_ids: Vec<String>,
        config_hashes: BTreeMap<String, String>,
        input_hashes: BTreeMap<String, String>,
        row_counts: BTreeMap<String, usize>,
        validation_summary: ValidationSummary,
        created_at: DateTime<Utc>,
    ) -> std::io::Result<u32> {
        let next_seq = self.list_versions()?.into_iter().max().unwrap_or(0) + 1;
        let version_dir = self.versions_root().join(format!("{next_seq:04}"));
        std::fs::create_dir_all(&version_dir)?;

        let mut artifact_checksums = BTreeMap::new();
        let mut artifact_sizes = BTreeMap::new();
        for name in [
            OBSERVATIONS_CSV,
            TREES_VIEW_CSV,
            RETAG_SUGGESTIONS_CSV,
            VALIDATION_REPORT_JSON,
        ] {
            let src = self.root.join(name);
            if !src.exists() {
                continue;
            }
            let dst = version_dir.join(name);
            std::fs::copy(&src, &dst)?;
            let bytes = std::fs::read(&dst)?;
            artifact_checksums.insert(name.to_string(), hex::encode(Sha256::digest(&bytes)));
            artifact_sizes.insert(name.to_string(), bytes.len() as u64);
        }

        let manifest = VersionManifest {
            version_seq: next_seq,
            created_at,
            tx_ids,
            config_hashes,
            input_hashes,
            artifact_checksums,
            artifact_sizes,
            row_counts,
            validation_summary,
        };
        let text = serde_json::to_string_pretty(&manifest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(version_dir.join("manifest.json"), text)?;
        Ok(next_seq)
    }

    pub fn diff_manifests(a: &VersionManifest, b: &VersionManifest) -> ManifestDiff {
        let a_tx: std::collections::BTreeSet<_> = a.tx_ids.iter().cloned().collect();
        let b_tx: std::collections::BTreeSet<_> = b.tx_ids.iter().cloned().collect();

        ManifestDiff {
            tx_ids_added: b_tx.difference(&a_tx).cloned().collect(),
            tx_ids_removed: a_tx.difference(&b_tx).cloned().collect(),
            row_count_deltas: diff_counts(&a.row_counts, &b.row_counts),
            artifact_changed: a
                .artifact_checksums
                .iter()
                .chain(b.artifact_checksums.iter())
                .map(|(k, _)| k.clone())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .filter(|k| a.artifact_checksums.get(k) != b.artifact_checksums.get(k))
                .collect(),
        }
    }
}

fn diff_counts(a: &BTreeMap<String, usize>, b: &BTreeMap<String, usize>) -> BTreeMap<String, i64> {
    let keys: std::collections::BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    let mut deltas = BTreeMap::new();
    for key in keys.into_iter() {
        let av = *a.get(key).unwrap_or(&0) as i64;
        let bv = *b.get(key).unwrap_or(&0) as i64;
        if av != bv {
            deltas.insert(key.clone(), bv - av);
        }
    }
    deltas
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestDiff {
    pub tx_ids_added: Vec<String>,
    pub tx_ids_removed: Vec<String>,
    pub row_count_deltas: BTreeMap<String, i64>,
    pub artifact_changed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_transaction_returns_false_when_log_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        assert!(!ledger.has_transaction("abc").unwrap());
    }

    #[test]
    fn write_version_assigns_sequential_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::new(dir.path());
        let seq1 = ledger
            .write_version(
                vec!["tx1".into()],
                BTreeMap::new(),
                BTreeMap::new(),
                BTreeMap::new(),
                ValidationSummary {
                    errors: 0,
                    warnings: 0,
                    by_code: BTreeMap::new(),
                },
                Utc::now(),
            )
            .unwrap();
        let seq2 = ledger
            .write_version(
                vec!["tx2".into()],
                BTreeMap::new(),
                BTreeMap::new(),
                BTreeMap::new(),
                ValidationSummary {
                    errors: 0,
                    warnings: 0,
                    by_code: BTreeMap::new(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(seq1, 1);
        assert_eq!(seq2, 2);
    }
}
