//! Object store configuration.

use serde::{Deserialize, Serialize};

/// Which object store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    /// Buckets map to directories under `local_root`
    Local,
}

/// Object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// AWS region override
    pub region: Option<String>,
    /// Custom endpoint (MinIO, LocalStack)
    pub endpoint_url: Option<String>,
    /// Path-style addressing, required by most S3-compatible servers
    #[serde(default)]
    pub force_path_style: bool,
    /// Root directory for the local backend
    #[serde(default = "default_local_root")]
    pub local_root: String,
}

fn default_local_root() -> String {
    "./data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            region: None,
            endpoint_url: None,
            force_path_style: false,
            local_root: default_local_root(),
        }
    }
}
