//! Validated configuration structs. Each `from_raw`-style constructor
//! mirrors the cross-field checks the original pydantic models performed,
//! expressed as plain validation functions since the crate has no schema
//! validation library in its dependency stack.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeciesEntry {
    pub genus: String,
    pub species: String,
    pub code: String,
}

impl SpeciesEntry {
    fn validate(&self) -> Result<(), String> {
        let expected = format!(
            "{}{}",
            self.genus.chars().take(3).collect::<String>(),
            self.species.chars().take(3).collect::<String>()
        )
        .to_uppercase();
        if self.code != expected {
            return Err(format!(
                "species {} {}: code {:?} must equal {:?}",
                self.genus, self.species, self.code, expected
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaxonomyConfigRaw {
    pub species: Vec<SpeciesEntry>,
    #[serde(default = "default_true")]
    pub enforce_no_synonyms: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct TaxonomyConfig {
    pub species: Vec<SpeciesEntry>,
    pub enforce_no_synonyms: bool,
    by_code: HashMap<String, usize>,
}

impl TaxonomyConfig {
    pub fn from_raw(raw: TaxonomyConfigRaw) -> Result<Self, ConfigError> {
        let mut seen_codes = HashSet::new();
        let mut seen_pairs = HashSet::new();
        let mut by_code = HashMap::new();
        for (idx, entry) in raw.species.iter().enumerate() {
            entry.validate().map_err(|message| ConfigError::Invalid {
                file: "taxonomy.toml".into(),
                message,
            })?;
            if !seen_codes.insert(entry.code.clone()) {
                return Err(ConfigError::Invalid {
                    file: "taxonomy.toml".into(),
                    message: format!("duplicate code {}", entry.code),
                });
            }
            let pair = (entry.genus.to_lowercase(), entry.species.to_lowercase());
            if raw.enforce_no_synonyms && !seen_pairs.insert(pair) {
                return Err(ConfigError::Invalid {
                    file: "taxonomy.toml".into(),
                    message: format!("duplicate genus/species pair {} {}", entry.genus, entry.species),
                });
            }
            by_code.insert(entry.code.clone(), idx);
        }
        Ok(TaxonomyConfig {
            species: raw.species,
            enforce_no_synonyms: raw.enforce_no_synonyms,
            by_code,
        })
    }

    pub fn contains_pair(&self, genus: &str, species: &str) -> bool {
        self.species
            .iter()
            .any(|e| e.genus == genus && e.species == species)
    }

    pub fn code_for(&self, genus: &str, species: &str) -> Option<&str> {
        self.species
            .iter()
            .find(|e| e.genus == genus && e.species == species)
            .map(|e| e.code.as_str())
    }

    pub fn is_known_code(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfigRaw {
    pub zone_order: Vec<String>,
    pub plots: Vec<String>,
    #[serde(default)]
    pub girdling: BTreeMap<String, NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SitesConfigRaw {
    pub sites: BTreeMap<String, SiteConfigRaw>,
}

#[derive(Debug, Clone)]
pub struct SitesConfig {
    pub sites: BTreeMap<String, SiteConfigRaw>,
}

impl SitesConfig {
    pub fn from_raw(raw: SitesConfigRaw) -> Result<Self, ConfigError> {
        if raw.sites.is_empty() {
            return Err(ConfigError::Invalid {
                file: "sites.toml".into(),
                message: "at least one site must be defined".into(),
            });
        }
        for (name, site) in &raw.sites {
            if site.zone_order.is_empty() {
                return Err(ConfigError::Invalid {
                    file: "sites.toml".into(),
                    message: format!("site {name}: zone_order must not be empty"),
                });
            }
            if site.plots.is_empty() {
                return Err(ConfigError::Invalid {
                    file: "sites.toml".into(),
                    message: format!("site {name}: plots must not be empty"),
                });
            }
            let unique: HashSet<&String> = site.plots.iter().collect();
            if unique.len() != site.plots.len() {
                return Err(ConfigError::Invalid {
                    file: "sites.toml".into(),
                    message: format!("site {name}: plots must be unique"),
                });
            }
        }
        Ok(SitesConfig { sites: raw.sites })
    }

    pub fn knows(&self, site: &str, plot: &str) -> bool {
        self.sites
            .get(site)
            .map(|s| s.plots.iter().any(|p| p == plot))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurveyWindow {
    pub id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SurveysConfigRaw {
    pub surveys: Vec<SurveyWindow>,
}

#[derive(Debug, Clone)]
pub struct SurveysConfig {
    pub surveys: Vec<SurveyWindow>,
}

impl SurveysConfig {
    pub fn from_raw(raw: SurveysConfigRaw) -> Result<Self, ConfigError> {
        let mut seen_ids = HashSet::new();
        for (idx, window) in raw.surveys.iter().enumerate() {
            if window.end < window.start {
                return Err(ConfigError::Invalid {
                    file: "surveys.toml".into(),
                    message: format!("surveys[{idx}].end must not be before start"),
                });
            }
            if !seen_ids.insert(window.id.clone()) {
                return Err(ConfigError::Invalid {
                    file: "surveys.toml".into(),
                    message: format!("duplicate survey id {}", window.id),
                });
            }
            if idx > 0 {
                let prev = &raw.surveys[idx - 1];
                if window.start <= prev.end {
                    return Err(ConfigError::Invalid {
                        file: "surveys.toml".into(),
                        message: format!(
                            "surveys[{idx}].start {} overlaps surveys[{}].end {}",
                            window.start,
                            idx - 1,
                            prev.end
                        ),
                    });
                }
            }
        }
        Ok(SurveysConfig {
            surveys: raw.surveys,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    pub rounding: String,
    pub dbh_pct_warn: f64,
    pub dbh_pct_error: f64,
    pub dbh_abs_floor_warn_mm: i64,
    pub dbh_abs_floor_error_mm: i64,
    pub retag_delta_pct: f64,
    pub new_tree_flag_min_dbh_mm: i64,
    pub drop_after_absent_surveys: u32,
}

impl ValidationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: String| {
            Err(ConfigError::Invalid {
                file: "validation.toml".into(),
                message,
            })
        };
        if self.dbh_pct_warn <= 0.0 || self.dbh_pct_error <= 0.0 {
            return fail("dbh_pct thresholds must be positive".into());
        }
        if self.dbh_pct_warn >= self.dbh_pct_error {
            return fail("dbh_pct_warn must be less than dbh_pct_error".into());
        }
        if self.dbh_abs_floor_warn_mm < 0 || self.dbh_abs_floor_error_mm < 0 {
            return fail("dbh_abs_floor thresholds must be >= 0".into());
        }
        if self.dbh_abs_floor_warn_mm >= self.dbh_abs_floor_error_mm {
            return fail("dbh_abs_floor_warn_mm must be < dbh_abs_floor_error_mm".into());
        }
        if self.retag_delta_pct <= 0.0 {
            return fail("retag_delta_pct must be positive".into());
        }
        if self.new_tree_flag_min_dbh_mm <= 0 {
            return fail("new_tree_flag_min_dbh_mm must be positive".into());
        }
        if self.drop_after_absent_surveys < 2 {
            return fail("drop_after_absent_surveys must be >= 2".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasheetsConfig {
    pub show_previous_surveys: u32,
    pub sort: String,
    pub show_zombie_asterisk: bool,
}

#[derive(Debug, Clone)]
pub struct ConfigBundle {
    pub taxonomy: TaxonomyConfig,
    pub sites: SitesConfig,
    pub surveys: SurveysConfig,
    pub validation: ValidationConfig,
    pub datasheets: DatasheetsConfig,
}

impl ConfigBundle {
    pub fn validate(
        taxonomy: TaxonomyConfigRaw,
        sites: SitesConfigRaw,
        surveys: SurveysConfigRaw,
        validation: ValidationConfig,
        datasheets: DatasheetsConfig,
    ) -> Result<Self, ConfigError> {
        validation.validate()?;
        Ok(ConfigBundle {
            taxonomy: TaxonomyConfig::from_raw(taxonomy)?,
            sites: SitesConfig::from_raw(sites)?,
            surveys: SurveysConfig::from_raw(surveys)?,
            validation,
            datasheets,
        })
    }
}
