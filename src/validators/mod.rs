//! Row, cross-survey growth, and DSL-semantic validators.

pub mod issues;
pub mod rows;
pub mod trees;
pub mod updates;

pub use issues::{sort_issues, Severity, ValidationIssue};
pub use rows::validate_measurement_rows;
pub use trees::validate_growth;
pub use updates::validate_dsl_commands;
