#![warn(missing_docs)]

//! A transactional ledger for a multi-year forest census: tag/tree identity
//! resolution over time via an alias/split DSL, property and primary-tag
//! timelines, implied-absence synthesis, cross-survey validation, and a
//! content-addressed ledger of versioned snapshots.

/// Configuration loading and validation (`sites.toml`, `surveys.toml`,
/// `taxonomy.toml`, `validation.toml`, `datasheets.toml`).
pub mod config;

/// The update DSL: typed command model, parser, and semantic state applier.
pub mod dsl;

/// Transaction directory loading, row normalization, and transaction ids.
pub mod transactions;

/// Tag/tree identity resolution, splits, timelines, and derived views.
pub mod assembly;

/// Cross-survey and DSL-level validators.
pub mod validators;

/// The content-addressed ledger: transaction log and versioned snapshots.
pub mod ledger;

/// Orchestrators binding the layers above into the operations the CLI runs.
pub mod engine;

/// Error taxonomy shared across every layer.
pub mod error;

pub use error::ForestLedgerError;

/// Commonly used types, re-exported for downstream binaries and tests.
pub mod prelude {
    pub use crate::config::ConfigBundle;
    pub use crate::dsl::Command;
    pub use crate::engine::{
        build_workspace, diff_manifests, generate_datasheet, lint_transaction, load_manifest,
        submit_transaction, BuildResult, DatasheetOptions, LintReport, SubmitResult,
    };
    pub use crate::error::ForestLedgerError;
    pub use crate::ledger::Ledger;
    pub use crate::transactions::MeasurementRow;
}
