//! Workers for the file pipeline.
//!
//! - Ingestion (upload notifications → JSON artifacts + metadata)
//! - Reporting (metadata window → JSON/HTML report + notification)
//! - Consumer (Redpanda → ingestion loop)
//! - Scheduler (consumer, report ticker, metrics logging)

pub mod clock;
pub mod consumer;
pub mod ingest;
pub mod notifications;
pub mod render;
pub mod report;
pub mod scheduler;
pub mod transform;

pub use clock::{Clock, FixedClock, SystemClock};
pub use consumer::{ConsumerWorker, EnvelopeSource};
pub use ingest::{output_key, IngestionOutcome, IngestionWorker};
pub use notifications::{NotificationChannel, NotificationPublisher};
pub use render::{render_html, render_json};
pub use report::{build_report, report_keys, Report, ReportGenerator, ReportOutcome, ReportSummary};
pub use scheduler::{WorkerConfig, WorkerScheduler};
pub use transform::{transform_csv, ProcessedDocument, TransformSummary};
