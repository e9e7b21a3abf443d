//! ClickHouse-backed metadata store for the file pipeline.

pub mod client;
pub mod config;
pub mod health;
pub mod metadata;
pub mod schema;

pub use client::*;
pub use config::*;
pub use metadata::{ClickHouseMetadataStore, MetadataRow};
