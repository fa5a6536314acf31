//! Core types and storage for the Monastery360 offline cache worker.
//!
//! This crate provides:
//! - Versioned cache generations with a SQLite backend
//! - Request keying for cache entries
//! - The asset manifest precached at install time
//! - Layered configuration and unified error types

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;

pub use cache::{CacheDb, StoredResponse};
pub use config::{AppConfig, InstallPolicy};
pub use error::Error;
pub use manifest::AssetManifest;
