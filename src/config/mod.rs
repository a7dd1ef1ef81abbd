//! Configuration loading and validation.

pub mod loader;
pub mod models;

pub use loader::{hash_config_files, load_config_bundle, ConfigFiles};
pub use models::{
    ConfigBundle, DatasheetsConfig, SiteConfigRaw, SitesConfig, SitesConfigRaw, SpeciesEntry,
    SurveyWindow, SurveysConfig, SurveysConfigRaw, TaxonomyConfig, TaxonomyConfigRaw,
    ValidationConfig,
};
