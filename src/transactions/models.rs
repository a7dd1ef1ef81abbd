//! Row and transaction-level data structures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Provenance of a measurement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Field,
    Ai,
    Implied,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Field => "field",
            Origin::Ai => "ai",
            Origin::Implied => "implied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "field" => Some(Origin::Field),
            "ai" => Some(Origin::Ai),
            "implied" => Some(Origin::Implied),
            _ => None,
        }
    }
}

/// A single per-stem measurement, at any pipeline stage from raw CSV row to
/// fully assembled, tree-identified observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRow {
    pub row_number: usize,
    pub site: String,
    pub plot: String,
    pub tag: String,
    pub date: NaiveDate,
    pub dbh_mm: Option<i64>,
    pub health: Option<i64>,
    pub standing: Option<bool>,
    pub notes: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub code: Option<String>,
    pub origin: Origin,
    pub flags: Vec<String>,
    pub raw: BTreeMap<String, String>,
    pub tree_uid: Option<String>,
    pub public_tag: Option<String>,
    pub source_tx: String,
}

impl MeasurementRow {
    pub fn spatial_key(&self) -> (String, String, String) {
        (self.site.clone(), self.plot.clone(), self.tag.clone())
    }
}

/// The `[survey]` table of an optional `survey_meta.toml` file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SurveyMeta {
    pub survey_id: Option<String>,
    pub start: Option<NaiveDate>,
}

/// A fully loaded, not-yet-normalized transaction directory.
#[derive(Debug, Clone)]
pub struct TransactionData {
    pub measurements_csv: String,
    pub updates_tdl: String,
    pub survey_meta: SurveyMeta,
}
