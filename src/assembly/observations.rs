//! Builds the canonical per-observation rows written to the ledger, each
//! carrying a deterministic `obs_id` and its containing survey id.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};

use crate::transactions::{MeasurementRow, Origin};

use super::survey::SurveyCatalog;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRow {
    pub obs_id: String,
    pub survey_id: String,
    pub tree_uid: String,
    pub public_tag: String,
    pub site: String,
    pub plot: String,
    pub tag: String,
    pub date: String,
    pub dbh_mm: Option<i64>,
    pub health: Option<i64>,
    pub standing: Option<bool>,
    pub notes: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub code: Option<String>,
    pub origin: String,
    pub row_number: usize,
    pub source_tx: String,
}

impl ObservationRow {
    /// Reconstitutes the looser [`MeasurementRow`] shape so a previously
    /// ledgered observation can flow back through assembly helpers (the
    /// tree view and retag suggestions) alongside a newly submitted
    /// transaction's rows.
    pub fn to_measurement_row(&self) -> MeasurementRow {
        MeasurementRow {
            row_number: self.row_number,
            site: self.site.clone(),
            plot: self.plot.clone(),
            tag: self.tag.clone(),
            date: NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").unwrap_or_default(),
            dbh_mm: self.dbh_mm,
            health: self.health,
            standing: self.standing,
            notes: self.notes.clone(),
            genus: self.genus.clone(),
            species: self.species.clone(),
            code: self.code.clone(),
            origin: Origin::parse(&self.origin).unwrap_or(Origin::Field),
            flags: Vec::new(),
            raw: Default::default(),
            tree_uid: Some(self.tree_uid.clone()),
            public_tag: Some(self.public_tag.clone()),
            source_tx: self.source_tx.clone(),
        }
    }
}

pub fn compute_observation_id(
    tx_id: &str,
    row_number: usize,
    site: &str,
    plot: &str,
    tag: &str,
    date: &str,
) -> String {
    let seed = format!("{tx_id}:{row_number}:{site}:{plot}:{tag}:{date}");
    hex::encode(Sha256::digest(seed.as_bytes()))
}

/// Assembles the final observation rows for a set of already tree-identified
/// measurement rows. Rows without a resolvable survey window are skipped.
pub fn assemble_observations(rows: &[MeasurementRow], catalog: &SurveyCatalog) -> Vec<ObservationRow> {
    rows.iter()
        .filter_map(|row| {
            let tree_uid = row.tree_uid.clone()?;
            let survey_id = catalog.survey_for_date(row.date)?.to_string();
            let date = row.date.to_string();
            let obs_id =
                compute_observation_id(&row.source_tx, row.row_number, &row.site, &row.plot, &row.tag, &date);
            Some(ObservationRow {
                obs_id,
                survey_id,
                tree_uid,
                public_tag: row.public_tag.clone().unwrap_or_else(|| row.tag.clone()),
                site: row.site.clone(),
                plot: row.plot.clone(),
                tag: row.tag.clone(),
                date,
                dbh_mm: row.dbh_mm,
                health: row.health,
                standing: row.standing,
                notes: row.notes.clone(),
                genus: row.genus.clone(),
                species: row.species.clone(),
                code: row.code.clone(),
                origin: row.origin.as_str().to_string(),
                row_number: row.row_number,
                source_tx: row.source_tx.clone(),
            })
        })
        .collect()
}
