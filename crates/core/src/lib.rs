//! Core types, store contracts, and settings for the file pipeline.

pub mod envelope;
pub mod error;
pub mod metadata;
pub mod settings;
pub mod stores;

pub use envelope::*;
pub use error::{Error, Result};
pub use metadata::*;
pub use settings::*;
pub use stores::*;
