//! Redpanda consumer delivering upload notification envelopes to the
//! ingestion worker.

pub mod config;
pub mod consumer;
pub mod health;

pub use config::*;
pub use consumer::*;
