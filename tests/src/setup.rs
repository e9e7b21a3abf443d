//! Common test setup functions.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use worker::{FixedClock, IngestionWorker, ReportGenerator};

use crate::mocks::{InMemoryMetadataStore, InMemoryObjectStore, RecordingNotifier};

pub const UPLOAD_BUCKET: &str = "uploads";
pub const OUTPUT_BUCKET: &str = "processed";
pub const REPORTS_BUCKET: &str = "reports";
pub const ENVIRONMENT: &str = "test";

/// The instant every test clock is frozen at.
pub fn frozen_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 6, 30, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Test context with in-memory stores behind both workers.
///
/// Both workers run their production code paths; only the store backends
/// and the clock are swapped out.
pub struct TestContext {
    pub now: DateTime<Utc>,
    pub objects: InMemoryObjectStore,
    pub metadata: InMemoryMetadataStore,
    pub notifier: RecordingNotifier,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_metadata(InMemoryMetadataStore::new())
    }

    pub fn with_metadata(metadata: InMemoryMetadataStore) -> Self {
        Self {
            now: frozen_now(),
            objects: InMemoryObjectStore::new(),
            metadata,
            notifier: RecordingNotifier::new(),
        }
    }

    fn clock(&self) -> Arc<FixedClock> {
        Arc::new(FixedClock(self.now))
    }

    pub fn ingestion(&self) -> IngestionWorker {
        IngestionWorker::new(
            Arc::new(self.objects.clone()),
            Arc::new(self.metadata.clone()),
            OUTPUT_BUCKET,
            self.clock(),
        )
    }

    pub fn reports(&self) -> ReportGenerator {
        ReportGenerator::new(
            Arc::new(self.metadata.clone()),
            Arc::new(self.objects.clone()),
            Arc::new(self.notifier.clone()),
            REPORTS_BUCKET,
            ENVIRONMENT,
            self.clock(),
        )
    }

    /// Seeds an uploaded CSV object.
    pub fn upload(&self, key: &str, csv: &str) {
        self.objects.insert(UPLOAD_BUCKET, key, csv.to_string());
    }
}
