//! File Pipeline
//!
//! Batch ingestion and daily reporting over object storage:
//! - Upload notifications consumed from Redpanda and ingested into JSON artifacts
//! - Processing metadata tracked in ClickHouse
//! - Daily JSON/HTML reports with notifications
//!
//! Run modes:
//! - `file-pipeline` runs the consumer and report scheduler until shutdown
//! - `file-pipeline report` runs one report invocation
//! - `file-pipeline ingest <file>` ingests a JSON array of envelope bodies once

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::signal;
use tracing::{error, info, warn};

use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseMetadataStore};
use pipeline_core::{Envelope, MetadataStore, ObjectStore, PipelineSettings};
use redpanda::{Consumer, ConsumerConfig};
use storage::StorageConfig;
use telemetry::init_tracing_from_env;
use worker::{
    Clock, IngestionWorker, NotificationPublisher, ReportGenerator, SystemClock, WorkerConfig,
    WorkerScheduler,
};

/// Application configuration.
///
/// The notification channel has no default; `log` must be chosen explicitly.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    settings: PipelineSettings,

    #[serde(default)]
    storage: StorageConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    redpanda: ConsumerConfig,

    #[serde(default)]
    worker: WorkerConfig,
}

enum Mode {
    Service,
    Report,
    Ingest(String),
}

fn parse_mode(mut args: impl Iterator<Item = String>) -> Result<Mode> {
    match args.next().as_deref() {
        None | Some("serve") => Ok(Mode::Service),
        Some("report") => Ok(Mode::Report),
        Some("ingest") => match args.next() {
            Some(path) => Ok(Mode::Ingest(path)),
            None => bail!("usage: file-pipeline ingest <envelopes.json>"),
        },
        Some(other) => bail!("unknown command `{}` (expected serve, report or ingest)", other),
    }
}

/// Store handles shared by both workers.
struct Stores {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    clock: Arc<dyn Clock>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider BEFORE any TLS operations
    // rustls 0.23+ requires explicit crypto provider selection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let mode = parse_mode(std::env::args().skip(1))?;

    info!("Starting File Pipeline v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .settings
        .ensure_valid()
        .context("Invalid pipeline settings")?;

    info!(
        output_bucket = %config.settings.output_bucket,
        reports_bucket = %config.settings.reports_bucket(),
        metadata_table = %config.settings.metadata_table,
        environment = %config.settings.environment,
        storage = ?config.storage.backend,
        "Loaded configuration"
    );

    let stores = connect_stores(&config).await?;

    match mode {
        Mode::Report => run_report(&config, &stores).await,
        Mode::Ingest(path) => run_ingest(&config, &stores, Path::new(&path)).await,
        Mode::Service => run_service(&config, stores).await,
    }
}

async fn connect_stores(config: &Config) -> Result<Stores> {
    let objects = storage::connect(&config.storage).await;

    let clickhouse = ClickHouseClient::new(config.clickhouse.clone());
    if clickhouse_client::health::check_connection(&clickhouse).await {
        info!("ClickHouse connection: healthy");
    } else {
        error!("ClickHouse connection: unhealthy");
    }

    if let Err(e) =
        clickhouse_client::health::init_schema(&clickhouse, &config.settings.metadata_table).await
    {
        error!("Failed to initialize ClickHouse schema: {}", e);
        // Continue anyway - schema might already exist
    }

    let metadata: Arc<dyn MetadataStore> = Arc::new(ClickHouseMetadataStore::new(
        clickhouse,
        &config.settings.metadata_table,
    ));

    Ok(Stores {
        objects,
        metadata,
        clock: Arc::new(SystemClock),
    })
}

fn ingestion_worker(config: &Config, stores: &Stores) -> IngestionWorker {
    IngestionWorker::new(
        stores.objects.clone(),
        stores.metadata.clone(),
        config.settings.output_bucket.clone(),
        stores.clock.clone(),
    )
}

fn report_generator(config: &Config, stores: &Stores) -> ReportGenerator {
    ReportGenerator::new(
        stores.metadata.clone(),
        stores.objects.clone(),
        Arc::new(NotificationPublisher::from_settings(&config.settings)),
        config.settings.reports_bucket(),
        config.settings.environment.clone(),
        stores.clock.clone(),
    )
}

async fn run_report(config: &Config, stores: &Stores) -> Result<()> {
    let outcome = report_generator(config, stores)
        .run()
        .await
        .context("Report generation failed")?;

    info!(
        json = %outcome.json_location,
        html = %outcome.html_location,
        total_files = outcome.summary.total_files_processed,
        success_rate = outcome.summary.success_rate_percent,
        "Report complete"
    );
    Ok(())
}

/// Reads a JSON array of envelope bodies. String elements are used as-is;
/// anything else is re-serialized.
fn read_envelopes(path: &Path) -> Result<Vec<Envelope>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let bodies: Vec<Value> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;

    let mut envelopes = Vec::with_capacity(bodies.len());
    for (idx, body) in bodies.into_iter().enumerate() {
        let body = match body {
            Value::String(text) => text,
            other => serde_json::to_string(&other)?,
        };
        envelopes.push(Envelope::new(body).with_message_id(format!("file:{}", idx)));
    }
    Ok(envelopes)
}

async fn run_ingest(config: &Config, stores: &Stores, path: &Path) -> Result<()> {
    let envelopes = read_envelopes(path)?;
    let outcome = ingestion_worker(config, stores)
        .process_batch(&envelopes)
        .await;

    info!(
        successful = outcome.successful,
        failed = outcome.failed,
        "Ingestion complete"
    );
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

async fn run_service(config: &Config, stores: Stores) -> Result<()> {
    if !redpanda::health::check_connection(&config.redpanda).await {
        warn!("Redpanda connection: unhealthy, consumer will keep retrying");
    }

    let consumer = Arc::new(Consumer::new(config.redpanda.clone()));
    let ingestion = Arc::new(ingestion_worker(config, &stores));
    let reports = Arc::new(report_generator(config, &stores));

    let scheduler = Arc::new(
        WorkerScheduler::new(config.worker.clone(), reports).with_consumer(consumer, ingestion),
    );
    let handles = scheduler.start();

    shutdown_signal().await;

    info!("Shutting down...");
    for handle in handles {
        handle.abort();
    }

    telemetry::log_snapshot(&telemetry::metrics().snapshot());
    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("PIPELINE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Flat variable names used by deployment tooling. These win over the
/// prefixed `PIPELINE_*` forms.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(bucket) = var("PROCESSED_BUCKET") {
        config.settings.output_bucket = bucket;
    }
    if let Some(bucket) = var("REPORTS_BUCKET") {
        config.settings.reports_bucket = Some(bucket);
    }
    if let Some(table) = var("METADATA_TABLE") {
        config.settings.metadata_table = table;
    }
    if let Some(channel) = var("NOTIFICATION_CHANNEL") {
        config.settings.notification_channel = channel;
    }
    if let Some(url) = var("NOTIFICATION_WEBHOOK_URL") {
        config.settings.notification_channel = url;
    }
    if let Some(environment) = var("ENVIRONMENT") {
        config.settings.environment = environment;
    }

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Some(brokers) = var("PIPELINE_REDPANDA_BROKERS") {
        config.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(username) = var("PIPELINE_REDPANDA_SASL_USERNAME") {
        config.redpanda.sasl_username = Some(username);
    }
    if let Some(password) = var("PIPELINE_REDPANDA_SASL_PASSWORD") {
        config.redpanda.sasl_password = Some(password);
    }
    if let Some(topic) = var("PIPELINE_REDPANDA_TOPIC") {
        config.redpanda.topic = topic;
    }

    if let Some(url) = var("PIPELINE_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Some(database) = var("PIPELINE_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Some(username) = var("PIPELINE_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Some(password) = var("PIPELINE_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    if let Some(endpoint) = var("PIPELINE_STORAGE_ENDPOINT_URL") {
        config.storage.endpoint_url = Some(endpoint);
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
