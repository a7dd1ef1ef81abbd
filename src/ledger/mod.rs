//! The content-addressed ledger: append-only transaction log, canonical
//! observation table, derived views, and versioned snapshots.

pub mod storage;

pub use storage::{Ledger, ManifestDiff, TransactionEntry, ValidationSummary, VersionManifest};
