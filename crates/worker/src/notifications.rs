//! Report notifications.
//!
//! Messages go to every configured channel: the log always, plus an HTTP
//! webhook when one is configured. Webhook responses are not inspected
//! beyond their status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline_core::{format_timestamp, Error, Notifier, PipelineSettings, Result};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::{info, warn};

use crate::report::Report;

/// Notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationChannel {
    /// Log only (default)
    Log,
    /// JSON POST to a webhook
    Webhook { url: String },
}

/// Webhook payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub subject: String,
    pub body: String,
}

/// Publishes notifications to every configured channel.
pub struct NotificationPublisher {
    channels: Vec<NotificationChannel>,
    http: reqwest::Client,
}

impl Default for NotificationPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationPublisher {
    pub fn new() -> Self {
        Self {
            channels: vec![NotificationChannel::Log],
            http: reqwest::Client::new(),
        }
    }

    pub fn with_channel(mut self, channel: NotificationChannel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Log channel plus the webhook named in the settings, if any.
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        let publisher = Self::new();
        match settings.webhook_url() {
            Some(url) if !url.is_empty() => publisher.with_channel(NotificationChannel::Webhook {
                url: url.to_string(),
            }),
            _ => publisher,
        }
    }

    pub fn channels(&self) -> &[NotificationChannel] {
        &self.channels
    }

    async fn post_webhook(&self, url: &str, payload: &NotificationPayload) -> Result<()> {
        self.http
            .post(url)
            .json(payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::notification(format!("webhook delivery to {} failed: {}", url, e)))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for NotificationPublisher {
    /// Delivers to every channel; the first delivery error is returned after
    /// the remaining channels have been tried.
    async fn publish(&self, subject: &str, body: &str) -> Result<()> {
        let payload = NotificationPayload {
            subject: subject.to_string(),
            body: body.to_string(),
        };
        let mut first_error = None;

        for channel in &self.channels {
            match channel {
                NotificationChannel::Log => {
                    info!(subject = %payload.subject, body = %payload.body, "Notification");
                }
                NotificationChannel::Webhook { url } => {
                    if let Err(e) = self.post_webhook(url, &payload).await {
                        warn!(url = %url, error = %e, "Notification delivery failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => {
                metrics().notification_errors.inc();
                Err(e)
            }
            None => {
                metrics().notifications_sent.inc();
                Ok(())
            }
        }
    }
}

/// Subject and body announcing a stored report.
pub fn report_message(
    report: &Report,
    json_location: &str,
    html_location: &str,
    now: DateTime<Utc>,
) -> (String, String) {
    let meta = &report.report_metadata;
    let summary = &report.summary;

    let subject = format!(
        "Daily Data Processing Report - {} - {}",
        meta.environment.to_uppercase(),
        now.format("%Y-%m-%d")
    );

    let mut body = format!(
        "Daily Data Processing Report\n\
         \n\
         Environment: {}\n\
         Generated At: {}\n\
         \n\
         SUMMARY\n\
         =======\n\
         Total Files Processed: {}\n\
         Successful: {}\n\
         Failed: {}\n\
         Success Rate: {:.2}%\n\
         Total Records: {}\n\
         Total Data Size: {:.2} MB\n\
         \n\
         Full report available at:\n\
         {}\n\
         \n\
         HTML Report:\n\
         {}\n",
        meta.environment,
        meta.generated_at,
        summary.total_files_processed,
        summary.successful_files,
        summary.failed_files,
        summary.success_rate_percent,
        summary.total_records_processed,
        summary.total_data_size_mb,
        json_location,
        html_location,
    );

    if summary.failed_files > 0 {
        body.push_str(&format!(
            "\nWARNING: {} files failed processing. Check the full report for details.\n",
            summary.failed_files
        ));
    }

    (subject, body)
}

/// Subject and body reporting a failed report invocation.
pub fn failure_message(environment: &str, cause: &Error, now: DateTime<Utc>) -> (String, String) {
    let subject = format!(
        "ERROR: Daily Report Generation Failed - {}",
        environment.to_uppercase()
    );
    let body = format!(
        "Report generation failed!\n\
         \n\
         Environment: {}\n\
         Time: {}\n\
         \n\
         Error Message:\n\
         {}\n\
         \n\
         Please investigate immediately.\n",
        environment,
        format_timestamp(now),
        cause
    );
    (subject, body)
}
