//! Process-wide pipeline settings.
//!
//! Resolved once at startup; a missing or empty required value aborts the
//! process before any store handle is created.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{Error, Result};

/// Channel value that routes notifications to the log only.
pub const LOG_CHANNEL: &str = "log";

/// Settings shared by the ingestion worker and the report generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineSettings {
    /// Bucket receiving processed JSON artifacts
    #[validate(custom(function = "validate_required"))]
    pub output_bucket: String,
    /// Bucket receiving reports (falls back to the output bucket)
    pub reports_bucket: Option<String>,
    /// Metadata table name
    #[validate(custom(function = "validate_required"))]
    pub metadata_table: String,
    /// `log` or an http(s) webhook URL
    #[validate(custom(function = "validate_channel"))]
    pub notification_channel: String,
    /// Environment tag stamped on reports and notifications
    #[validate(custom(function = "validate_required"))]
    pub environment: String,
}

impl PipelineSettings {
    /// Validates required settings, naming every offending field.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| field.to_string())
                .collect();
            fields.sort();
            Error::config(format!(
                "invalid pipeline settings ({}): {}",
                fields.join(", "),
                errors
            ))
        })
    }

    pub fn reports_bucket(&self) -> &str {
        self.reports_bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.output_bucket)
    }

    /// Webhook URL when the channel is not the log channel.
    pub fn webhook_url(&self) -> Option<&str> {
        let channel = self.notification_channel.trim();
        (channel != LOG_CHANNEL).then_some(channel)
    }
}

/// Rejects empty and whitespace-only values.
fn validate_required(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("value is required".into());
        return Err(err);
    }
    Ok(())
}

fn validate_channel(channel: &str) -> std::result::Result<(), ValidationError> {
    let channel = channel.trim();
    if channel == LOG_CHANNEL {
        return Ok(());
    }
    match url::Url::parse(channel) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("notification_channel");
            err.message = Some("must be `log` or an http(s) webhook URL".into());
            Err(err)
        }
    }
}
