//! Worker scheduler for the long-running service mode.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::consumer::{ConsumerWorker, EnvelopeSource};
use crate::ingest::IngestionWorker;
use crate::report::ReportGenerator;

/// Worker scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between report invocations
    pub report_interval_secs: u64,
    /// Seconds between metrics log lines
    pub metrics_log_interval_secs: u64,
    /// Whether to run a report as soon as the service starts
    pub report_on_start: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 86_400,
            metrics_log_interval_secs: 60,
            report_on_start: false,
        }
    }
}

impl WorkerConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }

    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_log_interval_secs.max(1))
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    reports: Arc<ReportGenerator>,
    ingestion: Option<(Arc<dyn EnvelopeSource>, Arc<IngestionWorker>)>,
}

impl WorkerScheduler {
    /// Scheduler that only runs the report ticker and metrics logger.
    pub fn new(config: WorkerConfig, reports: Arc<ReportGenerator>) -> Self {
        Self {
            config,
            reports,
            ingestion: None,
        }
    }

    /// Adds the envelope source → ingestion consumer loop.
    pub fn with_consumer(
        mut self,
        consumer: Arc<dyn EnvelopeSource>,
        ingestion: Arc<IngestionWorker>,
    ) -> Self {
        self.ingestion = Some((consumer, ingestion));
        self
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some((consumer, ingestion)) = &self.ingestion {
            let worker = ConsumerWorker::new(consumer.clone(), ingestion.clone());
            handles.push(tokio::spawn(async move {
                if let Err(e) = worker.run().await {
                    error!("Consumer worker fatal error: {}", e);
                }
            }));
            info!("Consumer worker started");
        }

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_report_ticker().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_logger().await;
        }));

        info!(
            report_interval_secs = self.config.report_interval_secs,
            "Background workers started"
        );
        handles
    }

    async fn run_report_ticker(&self) {
        let mut ticker = interval(self.config.report_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        if !self.config.report_on_start {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;

            // Failures are already logged and announced by the generator
            if let Ok(outcome) = self.reports.run().await {
                info!(
                    json = %outcome.json_location,
                    success_rate = outcome.summary.success_rate_percent,
                    "Scheduled report finished"
                );
            }
        }
    }

    async fn run_metrics_logger(&self) {
        use telemetry::{log_snapshot, metrics};

        let mut ticker = interval(self.config.metrics_log_interval());

        loop {
            ticker.tick().await;
            log_snapshot(&metrics().snapshot());
        }
    }
}
