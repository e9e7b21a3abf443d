//! ClickHouse configuration.

use serde::{Deserialize, Serialize};

/// ClickHouse client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    pub url: String,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
    /// Maximum rows returned per metadata scan page
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: u64,
}

fn default_database() -> String {
    "pipeline".to_string()
}

fn default_scan_page_size() -> u64 {
    100
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: default_database(),
            username: None,
            password: None,
            scan_page_size: default_scan_page_size(),
        }
    }
}
