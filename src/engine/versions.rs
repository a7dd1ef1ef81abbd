//! Inspecting and diffing version manifests.

use std::path::Path;

use crate::error::VersionNotFoundError;
use crate::ledger::{Ledger, ManifestDiff, VersionManifest};

pub fn load_manifest(workspace: &Path, seq: u32) -> Result<VersionManifest, VersionNotFoundError> {
    let ledger = Ledger::new(workspace);
    ledger
        .load_manifest(seq)
        .ok()
        .flatten()
        .ok_or(VersionNotFoundError::NotFound(seq))
}

pub fn diff_manifests(a: &VersionManifest, b: &VersionManifest) -> ManifestDiff {
    Ledger::diff_manifests(a, b)
}
