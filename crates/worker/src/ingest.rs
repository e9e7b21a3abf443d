//! Ingestion worker: upload notifications in, normalized JSON and metadata out.
//!
//! Every embedded upload event is processed on its own:
//! 1. Allocate a record id and write a PROCESSING metadata record
//! 2. Download the object and transform its rows
//! 3. Write the JSON artifact under a date-partitioned key
//! 4. Write the COMPLETED metadata record
//!
//! Any failure is recorded as a FAILED metadata record and counted; it never
//! fails the batch. Redelivered notifications are processed again under a
//! fresh record id.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use pipeline_core::{
    new_record_id, Envelope, Error, MetadataRecord, MetadataStore, ObjectStore, Result,
    UploadEvent, CONTENT_TYPE_JSON,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use telemetry::metrics;
use tracing::{error, info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::transform::transform_csv;

/// Counts reported back to the delivery mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub successful: u64,
    pub failed: u64,
}

impl IngestionOutcome {
    pub fn total(&self) -> u64 {
        self.successful + self.failed
    }
}

/// Output key for a processed file, partitioned by processing time.
///
/// `processed/<YYYY>/<MM>/<DD>/<stem>_<HHMMSS>.json`
pub fn output_key(stem: &str, processed_at: DateTime<Utc>) -> String {
    format!(
        "processed/{}/{}_{}.json",
        processed_at.format("%Y/%m/%d"),
        stem,
        processed_at.format("%H%M%S")
    )
}

/// Processes batches of upload notification envelopes.
pub struct IngestionWorker {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    output_bucket: String,
    clock: Arc<dyn Clock>,
}

impl IngestionWorker {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        output_bucket: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            objects,
            metadata,
            output_bucket: output_bucket.into(),
            clock,
        }
    }

    pub fn output_bucket(&self) -> &str {
        &self.output_bucket
    }

    /// Processes every upload event in every envelope.
    ///
    /// Never fails: malformed envelopes and failed events are tallied in the
    /// outcome so the batch is not redelivered.
    pub async fn process_batch(&self, envelopes: &[Envelope]) -> IngestionOutcome {
        info!(envelopes = envelopes.len(), "Processing envelope batch");

        let mut outcome = IngestionOutcome::default();

        for envelope in envelopes {
            let descriptors = match envelope.upload_descriptors() {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    error!(
                        message_id = envelope.message_id.as_deref().unwrap_or("-"),
                        error = %e,
                        "Failed to parse envelope"
                    );
                    metrics().envelopes_malformed.inc();
                    outcome.failed += 1;
                    continue;
                }
            };

            for descriptor in &descriptors {
                if self.process_event(descriptor).await {
                    outcome.successful += 1;
                } else {
                    outcome.failed += 1;
                }
            }
        }

        info!(
            successful = outcome.successful,
            failed = outcome.failed,
            "Envelope batch processed"
        );
        outcome
    }

    /// Processes one upload event. Returns whether it completed.
    pub async fn process_event(&self, descriptor: &Value) -> bool {
        // Allocated before anything can fail so a FAILED record always has an id
        let record_id = new_record_id();
        let started = Instant::now();

        let event = match UploadEvent::from_descriptor(descriptor) {
            Ok(event) => event,
            Err(e) => {
                error!(record_id = %record_id, error = %e, "Unreadable upload event");
                let pending = MetadataRecord::unidentified(record_id, self.clock.now());
                self.record_failure(pending, &e).await;
                metrics().files_failed.inc();
                return false;
            }
        };

        let span = info_span!(
            "ingest_file",
            record_id = %record_id,
            bucket = %event.bucket,
            key = %event.key
        );

        let processing = MetadataRecord::processing(
            record_id,
            &event.bucket,
            &event.key,
            event.size,
            self.clock.now(),
        );

        let result = self
            .ingest(&event, processing.clone())
            .instrument(span.clone())
            .await;

        metrics()
            .file_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        match result {
            Ok(rows) => {
                metrics().files_succeeded.inc();
                span.in_scope(|| info!(rows = rows, "Processed file"));
                true
            }
            Err(e) => {
                metrics().files_failed.inc();
                span.in_scope(|| {
                    error!(error = %e, retryable = e.is_retryable(), "Failed to process file")
                });
                self.record_failure(processing, &e).instrument(span).await;
                false
            }
        }
    }

    async fn ingest(&self, event: &UploadEvent, processing: MetadataRecord) -> Result<u64> {
        self.metadata.put(&processing).await?;

        let content = self.objects.get_text(&event.bucket, &event.key).await?;
        let document = transform_csv(&content, self.clock.as_ref())?;

        metrics().rows_processed.inc_by(document.summary.valid_records);
        metrics().rows_invalid.inc_by(document.summary.invalid_records);

        let key = output_key(event.stem(), self.clock.now());
        let body = serde_json::to_vec_pretty(&document)?;
        self.objects
            .put(&self.output_bucket, &key, Bytes::from(body), CONTENT_TYPE_JSON)
            .await?;

        let location = self.objects.location(&self.output_bucket, &key);
        let record_count = document.records.len() as u64;
        let completed = processing.complete(location, record_count, self.clock.now())?;
        self.metadata.put(&completed).await?;

        Ok(record_count)
    }

    /// Best-effort FAILED write; a failure here is logged and dropped.
    async fn record_failure(&self, pending: MetadataRecord, cause: &Error) {
        let record_id = pending.record_id.clone();
        let failed = match pending.fail(cause.to_string(), self.clock.now()) {
            Ok(record) => record,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Skipping failure record");
                return;
            }
        };

        if let Err(e) = self.metadata.put(&failed).await {
            metrics().failure_record_errors.inc();
            warn!(
                record_id = %record_id,
                error = %e,
                "Could not write FAILED metadata record"
            );
        }
    }
}
