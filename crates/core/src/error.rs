//! Unified error types for the file pipeline.
//!
//! Error codes:
//! - STORE_001-003: Object store, metadata store, and notification channel failures
//! - INPUT_001-002: Malformed envelopes and unparseable tabular content
//! - AGG_001: Unexpected data shape during report computation
//! - CONFIG_001: Missing or invalid process settings

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: Object store read or write failed
    ObjectStore,
    /// STORE_002: Metadata store read or write failed
    MetadataStore,
    /// STORE_003: Notification channel publish failed
    Notification,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ObjectStore => "STORE_001",
            Self::MetadataStore => "STORE_002",
            Self::Notification => "STORE_003",
        }
    }
}

/// Input error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputErrorCode {
    /// INPUT_001: Envelope or event descriptor not parseable
    Envelope,
    /// INPUT_002: Object content not parseable as delimited text
    Tabular,
}

impl InputErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Envelope => "INPUT_001",
            Self::Tabular => "INPUT_002",
        }
    }
}

/// Unified error type for the file pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Read/write against an external store failed. Not retried internally;
    /// redelivery is left to the invoking platform.
    #[error("[{code}] {message}")]
    TransientStore { code: &'static str, message: String },

    /// Envelope or tabular content could not be parsed. Counted, not retried.
    #[error("[{code}] {message}")]
    MalformedInput { code: &'static str, message: String },

    /// Unexpected data shape while computing a report.
    #[error("[AGG_001] {0}")]
    Aggregation(String),

    #[error("[CONFIG_001] {0}")]
    Config(String),

    #[error("invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error.
    pub fn store(code: StoreErrorCode, msg: impl Into<String>) -> Self {
        Self::TransientStore {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create an input error.
    pub fn malformed(code: InputErrorCode, msg: impl Into<String>) -> Self {
        Self::MalformedInput {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn object_store(msg: impl Into<String>) -> Self {
        Self::store(StoreErrorCode::ObjectStore, msg)
    }

    pub fn metadata_store(msg: impl Into<String>) -> Self {
        Self::store(StoreErrorCode::MetadataStore, msg)
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::store(StoreErrorCode::Notification, msg)
    }

    pub fn envelope(msg: impl Into<String>) -> Self {
        Self::malformed(InputErrorCode::Envelope, msg)
    }

    pub fn tabular(msg: impl Into<String>) -> Self {
        Self::malformed(InputErrorCode::Tabular, msg)
    }

    pub fn aggregation(msg: impl Into<String>) -> Self {
        Self::Aggregation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether platform-level redelivery could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore { .. })
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::TransientStore { code, .. } => Some(code),
            Self::MalformedInput { code, .. } => Some(code),
            Self::Aggregation(_) => Some("AGG_001"),
            Self::Config(_) => Some("CONFIG_001"),
            _ => None,
        }
    }
}
