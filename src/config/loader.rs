//! Loads the five TOML configuration files that make up a [`ConfigBundle`].

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::ConfigError;

use super::models::{
    ConfigBundle, DatasheetsConfig, SitesConfigRaw, SurveysConfigRaw, TaxonomyConfigRaw,
    ValidationConfig,
};

/// Canonical filenames expected inside a config directory.
pub struct ConfigFiles;

impl ConfigFiles {
    pub const TAXONOMY: &'static str = "taxonomy.toml";
    pub const SITES: &'static str = "sites.toml";
    pub const SURVEYS: &'static str = "surveys.toml";
    pub const VALIDATION: &'static str = "validation.toml";
    pub const DATASHEETS: &'static str = "datasheets.toml";
}

fn read_toml<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Result<T, ConfigError> {
    let path = dir.join(name);
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Toml { path, source })
}

#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_config_bundle(dir: &Path) -> Result<ConfigBundle, ConfigError> {
    let taxonomy: TaxonomyConfigRaw = read_toml(dir, ConfigFiles::TAXONOMY)?;
    let sites: SitesConfigRaw = read_toml(dir, ConfigFiles::SITES)?;
    let surveys: SurveysConfigRaw = read_toml(dir, ConfigFiles::SURVEYS)?;
    let validation: ValidationConfig = read_toml(dir, ConfigFiles::VALIDATION)?;
    let datasheets: DatasheetsConfig = read_toml(dir, ConfigFiles::DATASHEETS)?;
    ConfigBundle::validate(taxonomy, sites, surveys, validation, datasheets)
}

/// Hashes each of the five config files, keyed by filename, for inclusion in
/// transaction entries and version manifests.
pub fn hash_config_files(dir: &Path) -> Result<std::collections::BTreeMap<String, String>, ConfigError> {
    let mut hashes = std::collections::BTreeMap::new();
    for name in [
        ConfigFiles::TAXONOMY,
        ConfigFiles::SITES,
        ConfigFiles::SURVEYS,
        ConfigFiles::VALIDATION,
        ConfigFiles::DATASHEETS,
    ] {
        let path: PathBuf = dir.join(name);
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::Io { path, source })?;
        let digest = Sha256::digest(&bytes);
        hashes.insert(name.to_string(), hex::encode(digest));
    }
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn loads_a_minimal_valid_bundle() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "taxonomy.toml",
            "[[species]]\ngenus = \"Picea\"\nspecies = \"abies\"\ncode = \"PICABI\"\n",
        );
        write(
            dir.path(),
            "sites.toml",
            "[sites.BRNV]\nzone_order = [\"H4\"]\nplots = [\"H4\"]\n",
        );
        write(
            dir.path(),
            "surveys.toml",
            "[[surveys]]\nid = \"2019\"\nstart = 2019-06-01\nend = 2019-12-31\n",
        );
        write(
            dir.path(),
            "validation.toml",
            "rounding = \"half_up\"\ndbh_pct_warn = 0.08\ndbh_pct_error = 0.16\ndbh_abs_floor_warn_mm = 3\ndbh_abs_floor_error_mm = 6\nretag_delta_pct = 0.1\nnew_tree_flag_min_dbh_mm = 50\ndrop_after_absent_surveys = 2\n",
        );
        write(
            dir.path(),
            "datasheets.toml",
            "show_previous_surveys = 2\nsort = \"public_tag_numeric_asc\"\nshow_zombie_asterisk = true\n",
        );

        let bundle = load_config_bundle(dir.path()).unwrap();
        assert_eq!(bundle.taxonomy.species.len(), 1);
        assert!(bundle.sites.knows("BRNV", "H4"));
    }
}
