//! Telemetry for the file pipeline: structured logging setup and
//! process-wide counters that are periodically written to the log.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;
