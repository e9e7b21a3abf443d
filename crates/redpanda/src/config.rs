//! Redpanda consumer configuration.

use serde::{Deserialize, Serialize};

/// Where a consumer starts when it has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    Earliest,
    #[default]
    Latest,
}

/// Consumer configuration for the upload notification topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// Topic carrying upload notification envelopes
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Partition to read
    #[serde(default)]
    pub partition: i32,
    /// Consumer group (used for logging only)
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Maximum envelopes per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum wait for a batch in milliseconds
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
    /// Offset to start from on first connect
    #[serde(default)]
    pub start_offset: StartOffset,
    /// SASL username (enables TLS + SCRAM when set with a password)
    pub sasl_username: Option<String>,
    /// SASL password
    pub sasl_password: Option<String>,
}

fn default_topic() -> String {
    "upload-notifications".to_string()
}

fn default_group_id() -> String {
    "file-pipeline".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_timeout_ms() -> u64 {
    1000
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: default_topic(),
            partition: 0,
            group_id: default_group_id(),
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
            start_offset: StartOffset::default(),
            sasl_username: None,
            sasl_password: None,
        }
    }
}

impl ConsumerConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }
}
