//! Object store backends for the file pipeline.

pub mod config;
pub mod local;
pub mod s3;

use std::sync::Arc;

use pipeline_core::ObjectStore;

pub use config::*;
pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

/// Creates the configured object store.
pub async fn connect(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        StorageBackend::S3 => Arc::new(S3ObjectStore::connect(config).await),
        StorageBackend::Local => Arc::new(LocalObjectStore::new(&config.local_root)),
    }
}
