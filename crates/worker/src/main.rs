//! Offline cache worker entry point.
//!
//! Boots the worker through its lifecycle (install the manifest, activate
//! the new generation, sweep old ones) and then serves the interception
//! gateway. Logging goes to stderr as structured JSON.
//!
//! The runtime is single-threaded on purpose: request handling is entirely
//! non-blocking (cache I/O hops through the database's background thread,
//! network I/O suspends the handler), so one worker thread processes
//! intercepted requests cooperatively the way the original interception
//! runtime did.

use anyhow::Result;
use m360_client::{FetchClient, FetchConfig};
use m360_core::{AppConfig, CacheDb};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod gateway;
mod lifecycle;
mod strategy;
mod worker;

#[cfg(test)]
mod testutil;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(generation = %config.cache_name, "starting offline cache worker");

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        max_redirects: config.max_redirects,
    })?;
    let settings = worker::WorkerSettings::from_config(&config)?;

    let mut cache = worker::OfflineCache::new(db.clone(), fetcher, settings);

    // A failed install aborts startup: the previous generation (if any)
    // keeps serving whoever was pointed at it, and a redeploy is the retry
    // mechanism.
    let report = cache.install().await?;
    tracing::info!(cached = report.cached, failed = report.failed, "install finished");

    let swept = cache.activate().await?;
    let entries = db.count_entries(&config.cache_name).await?;
    tracing::info!(swept, entries, "active");

    let app = gateway::router(Arc::new(cache));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, origin = %config.origin, "gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
