//! The validation issue vocabulary shared by all validators.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub location: String,
}

impl ValidationIssue {
    pub fn error(code: impl Into<String>, message: impl Into<String>, location: impl Into<String>) -> Self {
        ValidationIssue {
            code: code.into(),
            severity: Severity::Error,
            message: message.into(),
            location: location.into(),
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>, location: impl Into<String>) -> Self {
        ValidationIssue {
            code: code.into(),
            severity: Severity::Warning,
            message: message.into(),
            location: location.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Sorts issues by `(severity, code, location)` for deterministic output.
/// Errors sort before warnings.
pub fn sort_issues(issues: &mut [ValidationIssue]) {
    issues.sort_by(|a, b| {
        (a.severity, &a.code, &a.location).cmp(&(b.severity, &b.code, &b.location))
    });
}
