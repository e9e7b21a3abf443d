//! CSV to JSON row transformation.
//!
//! Each data row becomes an object keyed by the trimmed header names with
//! trimmed values, plus a `processed_at` timestamp and a fresh `row_id`.
//! Rows whose field count differs from the header are counted invalid and
//! left out of the output.

use pipeline_core::{format_timestamp, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use crate::clock::Clock;

pub const PROCESSED_AT_FIELD: &str = "processed_at";
pub const ROW_ID_FIELD: &str = "row_id";

/// Row counts for one processed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSummary {
    pub total_records: u64,
    pub valid_records: u64,
    pub invalid_records: u64,
}

/// The JSON artifact written for each ingested file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub summary: TransformSummary,
    pub records: Vec<Map<String, Value>>,
    pub processed_timestamp: String,
}

/// Parses delimited text with a header row and normalizes every row.
pub fn transform_csv(content: &str, clock: &dyn Clock) -> Result<ProcessedDocument> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::tabular(format!("unreadable header row: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let collisions = header_collisions(&headers);
    if !collisions.is_empty() {
        warn!(
            columns = ?collisions,
            "Header columns collide with a repeated or generated field; later values win"
        );
    }

    let mut summary = TransformSummary::default();
    let mut records = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        let row = result.map_err(|e| Error::tabular(format!("row {}: {}", idx + 1, e)))?;
        summary.total_records += 1;

        if row.len() != headers.len() {
            warn!(
                row = idx + 1,
                fields = row.len(),
                expected = headers.len(),
                "Skipping row with mismatched field count"
            );
            summary.invalid_records += 1;
            continue;
        }

        let mut cleaned: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.clone(), Value::String(value.trim().to_string())))
            .collect();

        cleaned.insert(
            PROCESSED_AT_FIELD.to_string(),
            Value::String(format_timestamp(clock.now())),
        );
        cleaned.insert(
            ROW_ID_FIELD.to_string(),
            Value::String(Uuid::new_v4().to_string()),
        );

        records.push(cleaned);
        summary.valid_records += 1;
    }

    Ok(ProcessedDocument {
        summary,
        records,
        processed_timestamp: format_timestamp(clock.now()),
    })
}

/// Header names whose values would be overwritten in the output record:
/// repeats of an earlier column and names of the generated fields.
pub fn header_collisions(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut collisions = Vec::new();
    for header in headers {
        let generated = header == PROCESSED_AT_FIELD || header == ROW_ID_FIELD;
        if (!seen.insert(header.as_str()) || generated) && !collisions.contains(header) {
            collisions.push(header.clone());
        }
    }
    collisions
}
