//! In-memory command applier used by the lint/submit path to detect
//! conflicting commands before assembly ever runs. Deduplicates by
//! structural signature so replaying an identical command stream is a
//! silent no-op, and raises semantic errors on genuine conflicts.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::error::DslSemanticError;

use super::types::Command;

#[derive(Debug, Default)]
pub struct DslState {
    seen_signatures: HashSet<String>,
    alias_bindings: HashMap<(String, String, String, NaiveDate), String>,
    primary_bindings: HashMap<(String, NaiveDate), String>,
}

impl DslState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every command in order, returning the semantic errors found.
    /// Already-seen (by signature) commands are treated as no-ops, matching
    /// idempotent re-application of an identical stream.
    pub fn apply_all(&mut self, commands: &[Command]) -> Vec<(usize, DslSemanticError)> {
        let mut issues = Vec::new();
        for command in commands {
            if let Err(e) = self.apply(command) {
                issues.push((command.line_no(), e));
            }
        }
        issues
    }

    fn apply(&mut self, command: &Command) -> Result<(), DslSemanticError> {
        let signature = command.signature();
        if self.seen_signatures.contains(&signature) {
            return Ok(());
        }

        if let Command::Alias(alias) = command {
            if let Some(date) = alias.effective_date {
                let key = (
                    alias.target.site.clone(),
                    alias.target.plot.clone(),
                    alias.target.tag.clone(),
                    date,
                );
                let tree_sig = tree_ref_signature(&alias.tree_ref);
                if let Some(existing) = self.alias_bindings.get(&key) {
                    if existing != &tree_sig {
                        return Err(DslSemanticError::AliasOverlap {
                            site: key.0,
                            plot: key.1,
                            tag: key.2,
                            date,
                        });
                    }
                } else {
                    self.alias_bindings.insert(key, tree_sig);
                }

                if alias.primary {
                    let tree_sig = tree_ref_signature(&alias.tree_ref);
                    let pkey = (tree_sig.clone(), date);
                    if let Some(existing_tag) = self.primary_bindings.get(&pkey) {
                        if existing_tag != &alias.target.tag {
                            return Err(DslSemanticError::PrimaryConflict {
                                tree_uid: tree_sig,
                                date,
                            });
                        }
                    } else {
                        self.primary_bindings
                            .insert(pkey, alias.target.tag.clone());
                    }
                }
            }
        }

        self.seen_signatures.insert(signature);
        Ok(())
    }
}

fn tree_ref_signature(tree_ref: &super::types::TreeRef) -> String {
    match tree_ref {
        super::types::TreeRef::ByUuid { tree_uid } => tree_uid.clone(),
        super::types::TreeRef::ByTagAt { tag } => {
            format!("{}/{}/{}", tag.site, tag.plot, tag.tag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse_document;

    #[test]
    fn identical_commands_are_idempotent() {
        let text = "ALIAS A/B/1 TO A/B/2 EFFECTIVE 2020-01-01\n";
        let commands = parse_document(&format!("{text}{text}")).unwrap();
        let mut state = DslState::new();
        let issues = state.apply_all(&commands);
        assert!(issues.is_empty());
    }

    #[test]
    fn conflicting_alias_targets_raise_overlap() {
        let text = "ALIAS A/B/1 TO A/B/2 EFFECTIVE 2020-01-01\nALIAS A/B/1 TO A/B/3 EFFECTIVE 2020-01-01\n";
        let commands = parse_document(text).unwrap();
        let mut state = DslState::new();
        let issues = state.apply_all(&commands);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].1, DslSemanticError::AliasOverlap { .. }));
    }
}
