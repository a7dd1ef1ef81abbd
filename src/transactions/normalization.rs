//! Parses and normalizes the `measurements.csv` body of a transaction into
//! [`MeasurementRow`]s.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{TransactionDataError, TransactionFormatError};

use super::models::{MeasurementRow, Origin};

const REQUIRED_COLUMNS: &[&str] = &["site", "plot", "tag", "date", "dbh_mm", "health", "standing", "notes"];

pub fn normalize_measurements(
    csv_text: &str,
    source_tx: &str,
) -> Result<Vec<MeasurementRow>, NormalizationError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| TransactionFormatError::Csv {
            path: "measurements.csv".into(),
            row: 0,
            source,
        })?
        .clone();
    for required in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *required) {
            return Err(TransactionFormatError::MissingColumn((*required).to_string()).into());
        }
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let row_number = idx + 1;
        let record = record.map_err(|source| TransactionFormatError::Csv {
            path: "measurements.csv".into(),
            row: row_number,
            source,
        })?;
        let raw: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        rows.push(normalize_row(row_number, &raw, source_tx)?);
    }
    Ok(rows)
}

fn get<'a>(raw: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    raw.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn normalize_row(
    row_number: usize,
    raw: &BTreeMap<String, String>,
    source_tx: &str,
) -> Result<MeasurementRow, TransactionDataError> {
    let mut flags = Vec::new();

    let date = match get(raw, "date") {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
            TransactionDataError::InvalidDate {
                row: row_number,
                value: value.to_string(),
            }
        })?,
        None => {
            return Err(TransactionDataError::InvalidDate {
                row: row_number,
                value: String::new(),
            })
        }
    };

    let dbh_mm = match get(raw, "dbh_mm") {
        Some(value) => Some(value.parse::<f64>().map_err(|_| TransactionDataError::InvalidDbh {
            row: row_number,
            value: value.to_string(),
        })?.round() as i64),
        None => None,
    };

    let mut health = match get(raw, "health") {
        Some(value) => {
            let parsed: f64 = value.parse().map_err(|_| TransactionDataError::InvalidHealth {
                row: row_number,
                value: value.to_string(),
            })?;
            let rounded = round_half_up(parsed);
            if (rounded as f64 - parsed).abs() > f64::EPSILON {
                flags.push("health_rounded".to_string());
            }
            Some(rounded)
        }
        None => None,
    };

    if let Some(h) = health {
        if h < 0 || h > 10 {
            flags.push("health_clamped".to_string());
            health = Some(h.clamp(0, 10));
        }
    }

    let standing = match get(raw, "standing") {
        Some(value) => Some(parse_bool(row_number, "standing", value)?),
        None => None,
    };

    let alive = match get(raw, "alive") {
        Some(value) => Some(parse_bool(row_number, "alive", value)?),
        None => None,
    };
    if alive == Some(true) && health == Some(0) {
        health = Some(1);
        flags.push("alive_override".to_string());
    }

    let origin = match get(raw, "origin") {
        Some(value) => Origin::parse(value).ok_or_else(|| TransactionDataError::InvalidBool {
            row: row_number,
            column: "origin".to_string(),
            value: value.to_string(),
        })?,
        None => Origin::Field,
    };

    Ok(MeasurementRow {
        row_number,
        site: get(raw, "site").unwrap_or_default().to_string(),
        plot: get(raw, "plot").unwrap_or_default().to_string(),
        tag: get(raw, "tag").unwrap_or_default().to_string(),
        date,
        dbh_mm,
        health,
        standing,
        notes: get(raw, "notes").map(str::to_string),
        genus: get(raw, "genus").map(str::to_string),
        species: get(raw, "species").map(str::to_string),
        code: get(raw, "code").map(str::to_string),
        origin,
        flags,
        raw: raw.clone(),
        tree_uid: None,
        public_tag: None,
        source_tx: source_tx.to_string(),
    })
}

fn parse_bool(row_number: usize, column: &str, value: &str) -> Result<bool, TransactionDataError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(TransactionDataError::InvalidBool {
            row: row_number,
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}

fn round_half_up(value: f64) -> i64 {
    if value >= 0.0 {
        (value + 0.5).floor() as i64
    } else {
        -((-value + 0.5).floor() as i64)
    }
}

/// Wraps the two error kinds [`normalize_measurements`] can raise.
#[derive(Debug, thiserror::Error)]
pub enum NormalizationError {
    #[error(transparent)]
    Format(#[from] TransactionFormatError),
    #[error(transparent)]
    Data(#[from] TransactionDataError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_csv() {
        let csv = "site,plot,tag,date,dbh_mm,health,standing,notes\nBRNV,H4,112,2019-06-16,171,9,TRUE,\n";
        let rows = normalize_measurements(csv, "tx123").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].dbh_mm, Some(171));
        assert_eq!(rows[0].health, Some(9));
        assert_eq!(rows[0].standing, Some(true));
    }

    #[test]
    fn alive_override_bumps_zero_health() {
        let csv = "site,plot,tag,date,dbh_mm,health,standing,notes,alive\nBRNV,H4,112,2019-06-16,171,0,TRUE,,TRUE\n";
        let rows = normalize_measurements(csv, "tx123").unwrap();
        assert_eq!(rows[0].health, Some(1));
        assert!(rows[0].flags.contains(&"alive_override".to_string()));
    }

    #[test]
    fn missing_required_column_errors() {
        let csv = "site,plot,tag,date\nBRNV,H4,112,2019-06-16\n";
        let err = normalize_measurements(csv, "tx123").unwrap_err();
        assert!(matches!(err, NormalizationError::Format(_)));
    }
}
