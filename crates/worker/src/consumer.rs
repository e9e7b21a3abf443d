//! Consumer worker feeding upload notifications into the ingestion worker.
//!
//! 1. Fetch a batch of envelopes from Redpanda
//! 2. Ingest every upload event in the batch
//! 3. Commit the offset (at-least-once delivery)
//! 4. Repeat
//!
//! Ingestion never fails a batch, so the offset is committed once the batch
//! has been processed. Fetch errors pause briefly and reset the connection.

use async_trait::async_trait;
use pipeline_core::{Envelope, Result};
use redpanda::{Consumer, Offset};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::ingest::{IngestionOutcome, IngestionWorker};

/// Pause after a fetch or commit error.
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Batched source of envelopes with manual offset commits.
#[async_trait]
pub trait EnvelopeSource: Send + Sync {
    /// Next batch plus the offset to commit once it has been processed.
    /// The offset may be present even when every fetched record was empty.
    async fn fetch_batch(&self) -> Result<(Vec<Envelope>, Option<Offset>)>;

    async fn commit(&self, offset: Offset) -> Result<()>;

    /// Drops the connection so the next fetch reconnects.
    async fn reset_connection(&self);
}

#[async_trait]
impl EnvelopeSource for Consumer {
    async fn fetch_batch(&self) -> Result<(Vec<Envelope>, Option<Offset>)> {
        Consumer::fetch_batch(self).await
    }

    async fn commit(&self, offset: Offset) -> Result<()> {
        Consumer::commit(self, offset).await
    }

    async fn reset_connection(&self) {
        Consumer::reset_connection(self).await
    }
}

/// Worker that consumes envelopes and ingests them.
pub struct ConsumerWorker {
    source: Arc<dyn EnvelopeSource>,
    ingestion: Arc<IngestionWorker>,
}

impl ConsumerWorker {
    pub fn new(source: Arc<dyn EnvelopeSource>, ingestion: Arc<IngestionWorker>) -> Self {
        Self { source, ingestion }
    }

    /// Main run loop: fetch, ingest, commit. Runs indefinitely.
    pub async fn run(&self) -> Result<()> {
        info!(
            output_bucket = %self.ingestion.output_bucket(),
            "Consumer worker starting"
        );

        loop {
            match self.process_batch().await {
                Ok(outcome) => {
                    if outcome.total() > 0 {
                        debug!(
                            successful = outcome.successful,
                            failed = outcome.failed,
                            "Processed batch"
                        );
                    }
                }
                Err(e) => {
                    error!("Batch processing error: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    self.source.reset_connection().await;
                }
            }
        }
    }

    /// Processes a single batch: fetch → ingest → commit.
    ///
    /// The offset is committed whenever the fetch yielded one, including
    /// batches of tombstones and batches where every event failed.
    pub async fn process_batch(&self) -> Result<IngestionOutcome> {
        let (envelopes, offset) = self.source.fetch_batch().await?;

        let outcome = if envelopes.is_empty() {
            IngestionOutcome::default()
        } else {
            self.ingestion.process_batch(&envelopes).await
        };

        if let Some(offset) = offset {
            self.source.commit(offset).await?;
        }

        Ok(outcome)
    }
}
