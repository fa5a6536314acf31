//! HTTP fetch pipeline for the offline cache worker.
//!
//! This crate provides the network side of the worker: URL
//! canonicalization, a size- and time-bounded fetch client, and the
//! [`Fetcher`] trait the worker's routing strategies are written against.

pub mod fetch;

pub use fetch::url::{UrlError, canonicalize};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher, OutboundRequest};

pub use bytes::Bytes;
pub use reqwest::StatusCode;
pub use reqwest::header::HeaderMap;
