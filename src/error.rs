//! Crate-wide error taxonomy.
//!
//! Each concern gets its own error type; [`ForestLedgerError`] unifies them
//! for callers that just want to propagate and match on a coarse kind.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration in {file}: {message}")]
    Invalid { file: String, message: String },
}

/// Errors raised while parsing a transaction's measurement CSV.
#[derive(Debug, Error)]
pub enum TransactionFormatError {
    #[error("missing required column {0}")]
    MissingColumn(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV row {row} in {path}: {source}")]
    Csv {
        path: PathBuf,
        row: usize,
        #[source]
        source: csv::Error,
    },
}

/// Errors raised while normalizing or semantically validating row data.
#[derive(Debug, Error)]
pub enum TransactionDataError {
    #[error("row {row}: invalid dbh value {value:?}")]
    InvalidDbh { row: usize, value: String },
    #[error("row {row}: invalid health value {value:?}")]
    InvalidHealth { row: usize, value: String },
    #[error("row {row}: invalid boolean value {value:?} for column {column}")]
    InvalidBool {
        row: usize,
        column: String,
        value: String,
    },
    #[error("row {row}: invalid date {value:?}")]
    InvalidDate { row: usize, value: String },
}

/// Errors raised while parsing the DSL command stream.
#[derive(Debug, Error)]
pub enum DslParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// Errors raised while applying DSL commands against accumulated state.
#[derive(Debug, Error)]
pub enum DslSemanticError {
    #[error("alias overlap: tag {site}/{plot}/{tag} already bound at {date} to a different target")]
    AliasOverlap {
        site: String,
        plot: String,
        tag: String,
        date: chrono::NaiveDate,
    },
    #[error("primary conflict: tree {tree_uid} already has a primary tag set at {date}")]
    PrimaryConflict {
        tree_uid: String,
        date: chrono::NaiveDate,
    },
}

/// Errors raised while determining the default effective date for a transaction.
#[derive(Debug, Error)]
pub enum EffectiveDateError {
    #[error("survey id {0} is not defined in the surveys configuration")]
    UnknownSurveyId(String),
    #[error("cannot infer a default effective date: {0} surveys are configured")]
    AmbiguousSurveyCount(usize),
}

/// Errors raised while submitting a transaction.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("transaction rejected: {0} blocking issue(s) found during lint")]
    LintFailed(usize),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Format(#[from] TransactionFormatError),
    #[error(transparent)]
    Data(#[from] TransactionDataError),
    #[error(transparent)]
    DslParse(#[from] DslParseError),
    #[error(transparent)]
    DslSemantic(#[from] DslSemanticError),
    #[error(transparent)]
    EffectiveDate(#[from] EffectiveDateError),
    #[error("ledger I/O error: {0}")]
    Ledger(#[source] std::io::Error),
}

/// Errors raised while rebuilding the workspace from the transaction log.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no existing observations snapshot found; run submit at least once before build")]
    NoObservations,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("ledger I/O error: {0}")]
    Ledger(#[source] std::io::Error),
}

/// Errors raised while inspecting or diffing version manifests.
#[derive(Debug, Error)]
pub enum VersionNotFoundError {
    #[error("version {0:04} was not found in the ledger")]
    NotFound(u32),
}

/// Errors raised while generating field datasheets.
#[derive(Debug, Error)]
pub enum DatasheetsError {
    #[error("survey id {0} is not defined in the surveys configuration")]
    UnknownSurveyId(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("ledger I/O error: {0}")]
    Ledger(#[source] std::io::Error),
    #[error("no observations found for site {0}")]
    EmptySite(String),
}

/// Top-level error enum the CLI matches on to decide its exit code.
#[derive(Debug, Error)]
pub enum ForestLedgerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Format(#[from] TransactionFormatError),
    #[error(transparent)]
    Data(#[from] TransactionDataError),
    #[error(transparent)]
    DslParse(#[from] DslParseError),
    #[error(transparent)]
    DslSemantic(#[from] DslSemanticError),
    #[error(transparent)]
    EffectiveDate(#[from] EffectiveDateError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    VersionNotFound(#[from] VersionNotFoundError),
    #[error(transparent)]
    Datasheets(#[from] DatasheetsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForestLedgerError {
    /// Process exit code for this error, per the CLI's documented table:
    /// 2 validation, 3 DSL, 4 I/O, 5 config.
    pub fn exit_code(&self) -> i32 {
        match self {
            ForestLedgerError::Config(_) => 5,
            ForestLedgerError::DslParse(_) | ForestLedgerError::DslSemantic(_) => 3,
            ForestLedgerError::Submit(SubmitError::LintFailed(_)) => 2,
            ForestLedgerError::Submit(SubmitError::Config(_)) => 5,
            ForestLedgerError::Submit(SubmitError::DslParse(_))
            | ForestLedgerError::Submit(SubmitError::DslSemantic(_)) => 3,
            ForestLedgerError::Submit(_) => 4,
            ForestLedgerError::Build(BuildError::Config(_)) => 5,
            ForestLedgerError::Build(_) => 4,
            ForestLedgerError::Datasheets(DatasheetsError::Config(_)) => 5,
            ForestLedgerError::Datasheets(_) => 4,
            ForestLedgerError::Format(_) | ForestLedgerError::Data(_) => 4,
            ForestLedgerError::EffectiveDate(_) => 2,
            ForestLedgerError::VersionNotFound(_) => 4,
            ForestLedgerError::Io(_) => 4,
        }
    }
}
