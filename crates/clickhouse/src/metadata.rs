//! Metadata store backed by a ClickHouse table.

use async_trait::async_trait;
use chrono::Utc;
use clickhouse::Row;
use pipeline_core::{Error, MetadataRecord, MetadataStore, Result, ScanPage, TimeWindow};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::debug;

use crate::client::ClickHouseClient;

/// Flattened metadata row.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct MetadataRow {
    pub record_id: String,
    pub source_name: String,
    pub source_bucket: String,
    pub status: String,
    pub upload_timestamp: i64,
    pub size_bytes: u64,
    pub last_updated: String,
    pub output_location: Option<String>,
    pub record_count: Option<u64>,
    pub error_detail: Option<String>,
    pub version: u64,
}

impl MetadataRow {
    fn from_record(record: &MetadataRecord, version: u64) -> Self {
        Self {
            record_id: record.record_id.clone(),
            source_name: record.source_name.clone(),
            source_bucket: record.source_bucket.clone(),
            status: record.status.as_str().to_string(),
            upload_timestamp: record.upload_timestamp,
            size_bytes: record.size_bytes,
            last_updated: record.last_updated.clone(),
            output_location: record.output_location.clone(),
            record_count: record.record_count,
            error_detail: record.error_detail.clone(),
            version,
        }
    }
}

impl TryFrom<MetadataRow> for MetadataRecord {
    type Error = Error;

    fn try_from(row: MetadataRow) -> Result<Self> {
        Ok(Self {
            status: row.status.parse()?,
            record_id: row.record_id,
            source_name: row.source_name,
            source_bucket: row.source_bucket,
            upload_timestamp: row.upload_timestamp,
            size_bytes: row.size_bytes,
            last_updated: row.last_updated,
            output_location: row.output_location,
            record_count: row.record_count,
            error_detail: row.error_detail,
        })
    }
}

/// Metadata store over a ReplacingMergeTree table.
///
/// Scans use keyset pagination on `record_id`; the cursor is the last id of
/// a full page.
#[derive(Clone)]
pub struct ClickHouseMetadataStore {
    client: ClickHouseClient,
    table: String,
    page_size: u64,
}

impl ClickHouseMetadataStore {
    pub fn new(client: ClickHouseClient, table: &str) -> Self {
        let page_size = client.config().scan_page_size.max(1);
        let table = client.qualified(table);
        Self {
            client,
            table,
            page_size,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

#[async_trait]
impl MetadataStore for ClickHouseMetadataStore {
    async fn put(&self, record: &MetadataRecord) -> Result<()> {
        let version = Utc::now().timestamp_micros().max(0) as u64;
        let row = MetadataRow::from_record(record, version);

        let result: Result<()> = async {
            let mut insert = self
                .client
                .inner()
                .insert(&self.table)
                .map_err(|e| Error::metadata_store(format!("Insert error: {}", e)))?;
            insert
                .write(&row)
                .await
                .map_err(|e| Error::metadata_store(format!("Write error: {}", e)))?;
            insert
                .end()
                .await
                .map_err(|e| Error::metadata_store(format!("End error: {}", e)))
        }
        .await;

        match result {
            Ok(()) => {
                metrics().metadata_writes.inc();
                debug!(
                    record_id = %record.record_id,
                    status = %record.status,
                    "Stored metadata record"
                );
                Ok(())
            }
            Err(e) => {
                metrics().metadata_write_errors.inc();
                Err(e)
            }
        }
    }

    async fn scan_page(&self, window: &TimeWindow, cursor: Option<&str>) -> Result<ScanPage> {
        let sql = format!(
            "SELECT ?fields FROM {} FINAL \
             WHERE upload_timestamp >= ? AND upload_timestamp <= ? AND record_id > ? \
             ORDER BY record_id LIMIT ?",
            self.table
        );

        let rows: Vec<MetadataRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(window.start_secs())
            .bind(window.end_secs())
            .bind(cursor.unwrap_or(""))
            .bind(self.page_size)
            .fetch_all()
            .await
            .map_err(|e| Error::metadata_store(format!("Scan error: {}", e)))?;

        metrics().scan_pages.inc();

        let next_cursor = if rows.len() as u64 == self.page_size {
            rows.last().map(|row| row.record_id.clone())
        } else {
            None
        };

        let items = rows
            .into_iter()
            .map(MetadataRecord::try_from)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            items = items.len(),
            has_more = next_cursor.is_some(),
            "Scanned metadata page"
        );

        Ok(ScanPage { items, next_cursor })
    }
}
