//! Converts DSL semantic conflicts into `ValidationIssue`s.

use crate::dsl::{Command, DslState};
use crate::error::DslSemanticError;

use super::issues::ValidationIssue;

pub fn validate_dsl_commands(commands: &[Command]) -> Vec<ValidationIssue> {
    let mut state = DslState::new();
    state
        .apply_all(commands)
        .into_iter()
        .map(|(line_no, error)| match error {
            DslSemanticError::AliasOverlap {
                site,
                plot,
                tag,
                date,
            } => ValidationIssue::error(
                "E_ALIAS_OVERLAP",
                format!("{site}/{plot}/{tag} has conflicting alias targets at {date}"),
                format!("updates.tdl:{line_no}"),
            ),
            DslSemanticError::PrimaryConflict { tree_uid, date } => ValidationIssue::error(
                "E_PRIMARY_DUPLICATE_AT_DATE",
                format!("tree {tree_uid} has conflicting primary tags at {date}"),
                format!("updates.tdl:{line_no}"),
            ),
        })
        .collect()
}
