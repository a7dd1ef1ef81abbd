//! Transaction directory loading, row normalization, and content-addressed
//! transaction ids.

pub mod loader;
pub mod models;
pub mod normalization;
pub mod txid;

pub use loader::{load_transaction, scaffold_transaction};
pub use models::{MeasurementRow, Origin, SurveyMeta, TransactionData};
pub use normalization::{normalize_measurements, NormalizationError};
pub use txid::compute_tx_id;
