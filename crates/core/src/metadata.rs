//! Metadata records tracking each ingested object through its lifecycle.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Source name recorded when an event descriptor could not be read.
pub const UNKNOWN_SOURCE: &str = "<unknown>";

/// Lifecycle state of an ingested object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(Error::aggregation(format!(
                "unknown processing status: {}",
                other
            ))),
        }
    }
}

/// One metadata entry per ingested object.
///
/// Stores replace whole items on write, so every transition returns a full
/// record built from the previous one rather than a partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub record_id: String,
    pub source_name: String,
    pub source_bucket: String,
    pub status: ProcessingStatus,
    /// Epoch seconds, fixed when the PROCESSING record is created.
    pub upload_timestamp: i64,
    pub size_bytes: u64,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl MetadataRecord {
    /// Creates the initial PROCESSING record.
    pub fn processing(
        record_id: impl Into<String>,
        source_bucket: impl Into<String>,
        source_name: impl Into<String>,
        size_bytes: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            source_name: source_name.into(),
            source_bucket: source_bucket.into(),
            status: ProcessingStatus::Processing,
            upload_timestamp: now.timestamp(),
            size_bytes,
            last_updated: format_timestamp(now),
            output_location: None,
            record_count: None,
            error_detail: None,
        }
    }

    /// Creates a PROCESSING record for an event whose descriptor was unreadable.
    pub fn unidentified(record_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::processing(record_id, UNKNOWN_SOURCE, UNKNOWN_SOURCE, 0, now)
    }

    /// Transitions PROCESSING -> COMPLETED.
    pub fn complete(
        self,
        output_location: impl Into<String>,
        record_count: u64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        self.ensure_processing(ProcessingStatus::Completed)?;
        Ok(Self {
            status: ProcessingStatus::Completed,
            last_updated: format_timestamp(now),
            output_location: Some(output_location.into()),
            record_count: Some(record_count),
            error_detail: None,
            ..self
        })
    }

    /// Transitions PROCESSING -> FAILED.
    pub fn fail(self, detail: impl Into<String>, now: DateTime<Utc>) -> Result<Self> {
        self.ensure_processing(ProcessingStatus::Failed)?;
        Ok(Self {
            status: ProcessingStatus::Failed,
            last_updated: format_timestamp(now),
            output_location: None,
            record_count: None,
            error_detail: Some(detail.into()),
            ..self
        })
    }

    fn ensure_processing(&self, target: ProcessingStatus) -> Result<()> {
        if self.status != ProcessingStatus::Processing {
            return Err(Error::InvalidTransition(format!(
                "record {} is {}, cannot move to {}",
                self.record_id, self.status, target
            )));
        }
        Ok(())
    }
}

/// Generates a fresh record identifier.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// ISO-8601 UTC timestamp with microsecond precision.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
