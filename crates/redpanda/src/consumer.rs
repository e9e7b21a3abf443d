//! Redpanda consumer for upload notification envelopes.
//!
//! Uses rskafka with:
//! - Manual offset management for at-least-once delivery
//! - Batch fetching with configurable size and timeout
//! - Raw payload passthrough; envelope parsing is left to the ingestion worker

use crate::config::{ConsumerConfig, StartOffset};
use pipeline_core::{Envelope, Error, Result};
use rskafka::client::{
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    ClientBuilder, Credentials, SaslConfig,
};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Upper bound on a single envelope payload.
const MAX_ENVELOPE_BYTES: usize = 256 * 1024;

/// Creates a TLS configuration for Redpanda Cloud.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Client builder with TLS and SASL applied when credentials are configured.
pub(crate) fn client_builder(config: &ConsumerConfig) -> ClientBuilder {
    let builder = ClientBuilder::new(vec![config.broker_string()]);

    match (&config.sasl_username, &config.sasl_password) {
        (Some(username), Some(password)) => builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.clone(),
                password.clone(),
            ))),
        _ => builder,
    }
}

/// Offset tracking for manual commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub partition: i32,
    pub offset: i64,
}

/// Consumer for reading envelopes from Redpanda.
pub struct Consumer {
    config: ConsumerConfig,
    partition_client: RwLock<Option<Arc<PartitionClient>>>,
    /// Next offset to read
    current_offset: AtomicI64,
    initialized: AtomicBool,
}

impl Consumer {
    /// Creates a new consumer. Connection is established lazily.
    pub fn new(config: ConsumerConfig) -> Self {
        info!(
            group_id = %config.group_id,
            topic = %config.topic,
            partition = config.partition,
            batch_size = config.batch_size,
            "Creating Redpanda consumer"
        );

        Self {
            config,
            partition_client: RwLock::new(None),
            current_offset: AtomicI64::new(-1),
            initialized: AtomicBool::new(false),
        }
    }

    /// Returns the cached partition client, connecting if needed.
    async fn ensure_connected(&self) -> Result<Arc<PartitionClient>> {
        {
            let client = self.partition_client.read().await;
            if let Some(ref c) = *client {
                return Ok(c.clone());
            }
        }

        let client = client_builder(&self.config)
            .build()
            .await
            .map_err(|e| Error::internal(format!("Failed to connect to Redpanda: {}", e)))?;

        let partition_client = client
            .partition_client(
                self.config.topic.clone(),
                self.config.partition,
                UnknownTopicHandling::Error,
            )
            .await
            .map_err(|e| Error::internal(format!("Failed to get partition client: {}", e)))?;

        let partition_client = Arc::new(partition_client);

        if !self.initialized.load(Ordering::SeqCst) {
            let at = match self.config.start_offset {
                StartOffset::Earliest => OffsetAt::Earliest,
                StartOffset::Latest => OffsetAt::Latest,
            };
            let offset = partition_client
                .get_offset(at)
                .await
                .map_err(|e| Error::internal(format!("Failed to get offset: {}", e)))?;

            self.current_offset.store(offset, Ordering::SeqCst);
            self.initialized.store(true, Ordering::SeqCst);

            info!(
                topic = %self.config.topic,
                partition = self.config.partition,
                offset = offset,
                "Consumer initialized at offset"
            );
        }

        {
            let mut client_guard = self.partition_client.write().await;
            *client_guard = Some(partition_client.clone());
        }

        Ok(partition_client)
    }

    /// Fetches a batch of envelopes.
    ///
    /// Waits up to `batch_timeout_ms`. Returns the envelopes and the offset
    /// to commit once they have been processed.
    pub async fn fetch_batch(&self) -> Result<(Vec<Envelope>, Option<Offset>)> {
        let client = self.ensure_connected().await?;

        let timeout = Duration::from_millis(self.config.batch_timeout_ms);
        let max_bytes = (self.config.batch_size.max(1) * MAX_ENVELOPE_BYTES).min(i32::MAX as usize);
        let current = self.current_offset.load(Ordering::SeqCst);

        let (records, _watermark) = client
            .fetch_records(current, 1..max_bytes as i32, timeout.as_millis() as i32)
            .await
            .map_err(|e| {
                error!("Fetch error: {}", e);
                Error::internal(format!("Failed to fetch records: {}", e))
            })?;

        if records.is_empty() {
            return Ok((Vec::new(), None));
        }

        let mut envelopes = Vec::with_capacity(records.len());
        let mut max_offset = current;

        for record in records.into_iter().take(self.config.batch_size.max(1)) {
            max_offset = record.offset.max(max_offset);

            // Tombstones carry nothing to ingest
            if let Some(value) = record.record.value {
                let body = String::from_utf8_lossy(&value).into_owned();
                envelopes.push(
                    Envelope::new(body)
                        .with_message_id(format!("{}:{}", self.config.partition, record.offset)),
                );
            }
        }

        metrics().envelopes_received.inc_by(envelopes.len() as u64);

        debug!(
            envelopes = envelopes.len(),
            offset_start = current,
            offset_end = max_offset,
            "Fetched envelope batch from Redpanda"
        );

        let commit_offset = (max_offset >= current).then_some(Offset {
            partition: self.config.partition,
            offset: max_offset + 1,
        });

        Ok((envelopes, commit_offset))
    }

    /// Commits an offset after processing.
    ///
    /// Offsets are tracked in-process; a restart resumes from `start_offset`.
    pub async fn commit(&self, offset: Offset) -> Result<()> {
        let prev = self.current_offset.swap(offset.offset, Ordering::SeqCst);

        debug!(
            partition = offset.partition,
            prev_offset = prev,
            new_offset = offset.offset,
            "Committed offset"
        );

        Ok(())
    }

    /// Returns the current consumer offset.
    pub fn current_offset(&self) -> i64 {
        self.current_offset.load(Ordering::SeqCst)
    }

    /// Returns the consumer configuration.
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Resets the connection (for error recovery).
    pub async fn reset_connection(&self) {
        let mut client = self.partition_client.write().await;
        *client = None;
        info!("Consumer connection reset");
    }
}
