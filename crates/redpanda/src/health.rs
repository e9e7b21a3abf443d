//! Redpanda health checks.

use crate::config::ConsumerConfig;
use crate::consumer::client_builder;
use tracing::{debug, error, warn};

/// Check that the brokers are reachable and the topic exists.
pub async fn check_connection(config: &ConsumerConfig) -> bool {
    let client = match client_builder(config).build().await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to Redpanda: {}", e);
            return false;
        }
    };

    match client.list_topics().await {
        Ok(topics) => {
            let found = topics.iter().any(|t| t.name == config.topic);
            if found {
                debug!(topic = %config.topic, "Redpanda connection healthy");
            } else {
                warn!(topic = %config.topic, "Upload notification topic does not exist");
            }
            found
        }
        Err(e) => {
            error!("Failed to list Redpanda topics: {}", e);
            false
        }
    }
}
