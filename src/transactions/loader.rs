//! Reads a transaction directory's raw files off disk.

use std::path::Path;

use crate::error::TransactionFormatError;

use super::models::{SurveyMeta, TransactionData};

const MEASUREMENTS_FILE: &str = "measurements.csv";
const UPDATES_FILE: &str = "updates.tdl";
const SURVEY_META_FILE: &str = "survey_meta.toml";

pub fn load_transaction(tx_dir: &Path) -> Result<TransactionData, TransactionFormatError> {
    let measurements_csv = read_required(tx_dir, MEASUREMENTS_FILE)?;
    let updates_tdl = read_optional(tx_dir, UPDATES_FILE)?.unwrap_or_default();
    let survey_meta = match read_optional(tx_dir, SURVEY_META_FILE)? {
        Some(text) => toml::from_str(&text).map_err(|_| TransactionFormatError::Io {
            path: tx_dir.join(SURVEY_META_FILE),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed survey_meta.toml"),
        })?,
        None => SurveyMeta::default(),
    };
    Ok(TransactionData {
        measurements_csv,
        updates_tdl,
        survey_meta,
    })
}

fn read_required(dir: &Path, name: &str) -> Result<String, TransactionFormatError> {
    let path = dir.join(name);
    std::fs::read_to_string(&path).map_err(|source| TransactionFormatError::Io { path, source })
}

fn read_optional(dir: &Path, name: &str) -> Result<Option<String>, TransactionFormatError> {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(text)),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TransactionFormatError::Io { path, source }),
    }
}

/// Scaffolds an empty transaction directory for `tx new`.
pub fn scaffold_transaction(tx_dir: &Path, force: bool) -> std::io::Result<()> {
    if tx_dir.exists() && !force {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists; pass --force to overwrite", tx_dir.display()),
        ));
    }
    std::fs::create_dir_all(tx_dir)?;
    std::fs::write(
        tx_dir.join(MEASUREMENTS_FILE),
        "site,plot,tag,date,dbh_mm,health,standing,notes\n",
    )?;
    std::fs::write(tx_dir.join(UPDATES_FILE), "")?;
    Ok(())
}
