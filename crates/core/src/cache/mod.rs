//! SQLite-backed cache generations for the offline worker.
//!
//! A generation is a named, versioned container of request->response pairs.
//! Exactly one generation is current at a time; stale generations are swept
//! on activation. The backend uses SQLite with async access via
//! tokio-rusqlite:
//!
//! - WAL mode for concurrent access
//! - Automatic schema migrations
//! - Request-keyed entries (SHA-256 over method, URL, and vary headers)

pub mod connection;
pub mod generations;
pub mod key;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use generations::StoredResponse;
