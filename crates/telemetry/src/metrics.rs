//! Pipeline metrics.
//!
//! Collected in-memory and periodically written to the log by the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 10ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s, 60s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [10, 50, 100, 250, 500, 1000, 2500, 5000, 10000, 30000, 60000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns (upper bound ms, count) pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub envelopes_received: Counter,
    pub envelopes_malformed: Counter,
    pub files_succeeded: Counter,
    pub files_failed: Counter,
    pub rows_processed: Counter,
    pub rows_invalid: Counter,
    pub failure_record_errors: Counter,

    // Metadata store
    pub metadata_writes: Counter,
    pub metadata_write_errors: Counter,
    pub scan_pages: Counter,

    // Reporting
    pub reports_generated: Counter,
    pub reports_failed: Counter,
    pub notifications_sent: Counter,
    pub notification_errors: Counter,

    // Latency histograms
    pub file_latency_ms: Histogram,
    pub report_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub envelopes_received: u64,
    pub envelopes_malformed: u64,
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub rows_processed: u64,
    pub rows_invalid: u64,
    pub failure_record_errors: u64,
    pub metadata_writes: u64,
    pub metadata_write_errors: u64,
    pub scan_pages: u64,
    pub reports_generated: u64,
    pub reports_failed: u64,
    pub notifications_sent: u64,
    pub notification_errors: u64,
    pub file_latency_mean_ms: f64,
    pub report_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            envelopes_received: self.envelopes_received.get(),
            envelopes_malformed: self.envelopes_malformed.get(),
            files_succeeded: self.files_succeeded.get(),
            files_failed: self.files_failed.get(),
            rows_processed: self.rows_processed.get(),
            rows_invalid: self.rows_invalid.get(),
            failure_record_errors: self.failure_record_errors.get(),
            metadata_writes: self.metadata_writes.get(),
            metadata_write_errors: self.metadata_write_errors.get(),
            scan_pages: self.scan_pages.get(),
            reports_generated: self.reports_generated.get(),
            reports_failed: self.reports_failed.get(),
            notifications_sent: self.notifications_sent.get(),
            notification_errors: self.notification_errors.get(),
            file_latency_mean_ms: self.file_latency_ms.mean(),
            report_latency_mean_ms: self.report_latency_ms.mean(),
        }
    }
}

/// Writes a snapshot to the log as structured fields.
pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    tracing::info!(
        envelopes_received = snapshot.envelopes_received,
        envelopes_malformed = snapshot.envelopes_malformed,
        files_succeeded = snapshot.files_succeeded,
        files_failed = snapshot.files_failed,
        rows_processed = snapshot.rows_processed,
        rows_invalid = snapshot.rows_invalid,
        metadata_write_errors = snapshot.metadata_write_errors,
        reports_generated = snapshot.reports_generated,
        reports_failed = snapshot.reports_failed,
        file_latency_mean_ms = snapshot.file_latency_mean_ms,
        "Pipeline metrics"
    );
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
