//! Daily report generation.
//!
//! Scans every metadata record uploaded in the trailing window, aggregates
//! counts, rankings, and recent failures, stores the report as JSON and
//! HTML, and publishes a summary notification. Unlike ingestion, any failure
//! here fails the whole invocation after an error notification goes out.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use pipeline_core::{
    format_timestamp, Error, MetadataRecord, MetadataStore, Notifier, ObjectStore,
    ProcessingStatus, Result, TimeWindow, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON,
};
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::clock::Clock;
use crate::notifications::{failure_message, report_message};
use crate::render::{render_html, render_json};

/// Trailing window covered by a report.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Cap on both the top-files and error lists.
pub const TOP_N: usize = 10;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub report_period_start: String,
    pub report_period_end: String,
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_files_processed: u64,
    pub successful_files: u64,
    pub failed_files: u64,
    pub in_progress_files: u64,
    pub success_rate_percent: f64,
    pub total_records_processed: u64,
    pub total_data_size_bytes: u64,
    pub total_data_size_mb: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyStats {
    pub count: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub error: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopFile {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "recordCount")]
    pub record_count: u64,
}

/// The aggregated report for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub hourly_breakdown: BTreeMap<String, HourlyStats>,
    pub errors: Vec<ErrorEntry>,
    pub top_files: Vec<TopFile>,
}

/// Rounds to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn upload_time(record: &MetadataRecord) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(record.upload_timestamp, 0).ok_or_else(|| {
        Error::aggregation(format!(
            "record {} has out-of-range upload timestamp {}",
            record.record_id, record.upload_timestamp
        ))
    })
}

/// Hour bucket key (UTC).
pub fn hour_bucket(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:00").to_string()
}

/// Aggregates records into a report. Records are taken in scan order.
pub fn build_report(
    records: &[MetadataRecord],
    window: &TimeWindow,
    generated_at: DateTime<Utc>,
    environment: &str,
) -> Result<Report> {
    let mut completed = 0u64;
    let mut failed = 0u64;
    let mut in_progress = 0u64;
    let mut total_records = 0u64;
    let mut total_bytes = 0u64;
    let mut hourly: BTreeMap<String, HourlyStats> = BTreeMap::new();
    let mut errors = Vec::new();

    for record in records {
        let uploaded = upload_time(record)?;
        let bucket = hourly.entry(hour_bucket(uploaded)).or_default();
        bucket.count += 1;
        total_bytes = total_bytes.saturating_add(record.size_bytes);

        match record.status {
            ProcessingStatus::Completed => {
                completed += 1;
                bucket.completed += 1;
                total_records = total_records.saturating_add(record.record_count.unwrap_or(0));
            }
            ProcessingStatus::Failed => {
                failed += 1;
                bucket.failed += 1;
                // First entries in scan order, not the most recent ones
                if errors.len() < TOP_N {
                    if let Some(detail) = record.error_detail.as_deref().filter(|d| !d.is_empty()) {
                        errors.push(ErrorEntry {
                            file_name: record.source_name.clone(),
                            error: detail.to_string(),
                            timestamp: uploaded.to_rfc3339_opts(SecondsFormat::Secs, true),
                        });
                    }
                }
            }
            ProcessingStatus::Processing => in_progress += 1,
        }
    }

    let total = records.len() as u64;
    let success_rate = if total == 0 {
        0.0
    } else {
        round2(completed as f64 / total as f64 * 100.0)
    };

    // Stable sort keeps scan order among equal counts
    let mut top_files: Vec<TopFile> = records
        .iter()
        .filter_map(|r| {
            r.record_count.map(|count| TopFile {
                file_name: r.source_name.clone(),
                record_count: count,
            })
        })
        .collect();
    top_files.sort_by(|a, b| b.record_count.cmp(&a.record_count));
    top_files.truncate(TOP_N);

    Ok(Report {
        report_metadata: ReportMetadata {
            generated_at: format_timestamp(generated_at),
            report_period_start: format_timestamp(window.start),
            report_period_end: format_timestamp(window.end),
            environment: environment.to_string(),
        },
        summary: ReportSummary {
            total_files_processed: total,
            successful_files: completed,
            failed_files: failed,
            in_progress_files: in_progress,
            success_rate_percent: success_rate,
            total_records_processed: total_records,
            total_data_size_bytes: total_bytes,
            total_data_size_mb: round2(total_bytes as f64 / BYTES_PER_MB),
        },
        hourly_breakdown: hourly,
        errors,
        top_files,
    })
}

/// JSON and HTML keys for a report generated at `at`.
///
/// `daily-reports/<YYYY>/<MM>/<DD>/report_<YYYYMMDD>_<HHMMSS>.{json,html}`
pub fn report_keys(at: DateTime<Utc>) -> (String, String) {
    let base = format!(
        "daily-reports/{}/report_{}",
        at.format("%Y/%m/%d"),
        at.format("%Y%m%d_%H%M%S")
    );
    (format!("{}.json", base), format!("{}.html", base))
}

/// Result of a successful report invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub json_location: String,
    pub html_location: String,
    pub summary: ReportSummary,
}

/// Builds, stores, and announces the daily report.
pub struct ReportGenerator {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    reports_bucket: String,
    environment: String,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl ReportGenerator {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        reports_bucket: impl Into<String>,
        environment: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            metadata,
            objects,
            notifier,
            reports_bucket: reports_bucket.into(),
            environment: environment.into(),
            window: Duration::hours(DEFAULT_WINDOW_HOURS),
            clock,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Runs one report invocation.
    ///
    /// On failure an error notification is attempted and the original error
    /// is returned.
    pub async fn run(&self) -> Result<ReportOutcome> {
        let started = Instant::now();
        let span = info_span!("daily_report", environment = %self.environment);

        let result = self.generate().instrument(span.clone()).await;
        metrics()
            .report_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        match result {
            Ok(outcome) => {
                metrics().reports_generated.inc();
                span.in_scope(|| {
                    info!(
                        json = %outcome.json_location,
                        total_files = outcome.summary.total_files_processed,
                        "Report generation completed"
                    )
                });
                Ok(outcome)
            }
            Err(e) => {
                metrics().reports_failed.inc();
                span.in_scope(|| error!(error = %e, "Report generation failed"));
                self.notify_failure(&e).instrument(span).await;
                Err(e)
            }
        }
    }

    async fn generate(&self) -> Result<ReportOutcome> {
        let end = self.clock.now();
        let window = TimeWindow::trailing(end, self.window);

        let records = self.fetch_window(&window).await?;
        let report = build_report(&records, &window, self.clock.now(), &self.environment)?;

        let (json_key, html_key) = report_keys(end);
        let json = render_json(&report)?;
        let html = render_html(&report)?;

        self.objects
            .put(&self.reports_bucket, &json_key, Bytes::from(json), CONTENT_TYPE_JSON)
            .await?;
        self.objects
            .put(&self.reports_bucket, &html_key, Bytes::from(html), CONTENT_TYPE_HTML)
            .await?;

        let json_location = self.objects.location(&self.reports_bucket, &json_key);
        let html_location = self.objects.location(&self.reports_bucket, &html_key);
        info!(json = %json_location, html = %html_location, "Report saved");

        let (subject, body) = report_message(&report, &json_location, &html_location, end);
        self.notifier.publish(&subject, &body).await?;

        Ok(ReportOutcome {
            json_location,
            html_location,
            summary: report.summary,
        })
    }

    /// Collects every record in the window, following continuation cursors
    /// until the store reports none.
    pub async fn fetch_window(&self, window: &TimeWindow) -> Result<Vec<MetadataRecord>> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self.metadata.scan_page(window, cursor.as_deref()).await?;
            pages += 1;
            // Stores filter server-side; keep the window contract regardless
            records.extend(
                page.items
                    .into_iter()
                    .filter(|r| window.contains(r.upload_timestamp)),
            );

            match page.next_cursor {
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(Error::metadata_store(format!(
                        "scan cursor did not advance: {} was already visited",
                        next
                    )));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(pages = pages, records = records.len(), "Fetched report window");
        Ok(records)
    }

    async fn notify_failure(&self, cause: &Error) {
        let (subject, body) = failure_message(&self.environment, cause, self.clock.now());
        if let Err(e) = self.notifier.publish(&subject, &body).await {
            warn!(error = %e, "Could not publish report failure notification");
        }
    }
}
