//! Contracts for the external collaborators the pipeline talks to.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::metadata::MetadataRecord;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// Blob storage addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads a whole object as UTF-8 text.
    async fn get_text(&self, bucket: &str, key: &str) -> Result<String>;

    /// Writes an object, replacing any existing content.
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// Display form of an object location.
    fn location(&self, bucket: &str, key: &str) -> String {
        format!("s3://{}/{}", bucket, key)
    }
}

/// Closed time range over upload timestamps (epoch seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The window of `length` ending at `end`.
    pub fn trailing(end: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start: end - length,
            end,
        }
    }

    pub fn start_secs(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_secs(&self) -> i64 {
        self.end.timestamp()
    }

    /// Inclusive on both ends.
    pub fn contains(&self, epoch_secs: i64) -> bool {
        (self.start_secs()..=self.end_secs()).contains(&epoch_secs)
    }
}

/// One page of a filtered scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<MetadataRecord>,
    /// Continuation token; `None` once the scan is exhausted.
    pub next_cursor: Option<String>,
}

/// Durable metadata records keyed by record id.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Full-item upsert keyed by `record.record_id`.
    async fn put(&self, record: &MetadataRecord) -> Result<()>;

    /// Returns one page of records whose upload timestamp falls in `window`.
    ///
    /// Pages may be short or even empty while a cursor is still returned;
    /// callers must keep going until `next_cursor` is `None`.
    async fn scan_page(&self, window: &TimeWindow, cursor: Option<&str>) -> Result<ScanPage>;
}

/// Plain-text notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, body: &str) -> Result<()>;
}
