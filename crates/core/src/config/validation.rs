//! Configuration validation rules.
//!
//! Validation runs after `AppConfig` values have been loaded from
//! environment, file, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_name` or `user_agent` is empty
    /// - `origin` is not an absolute http(s) URL
    /// - `listen_addr` is not a socket address
    /// - `api_prefix` or `fallback_document` does not start with `/`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_redirects` exceeds 20
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.is_empty() {
            return Err(invalid("cache_name", "must not be empty"));
        }

        match url::Url::parse(&self.origin) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(invalid("origin", &format!("unsupported scheme {}", url.scheme())));
            }
            Err(e) => return Err(invalid("origin", &e.to_string())),
        }

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(invalid("listen_addr", "must be a socket address like 127.0.0.1:3360"));
        }

        if !self.api_prefix.starts_with('/') {
            return Err(invalid("api_prefix", "must start with /"));
        }
        if !self.fallback_document.starts_with('/') {
            return Err(invalid("fallback_document", "must start with /"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_redirects > 20 {
            return Err(invalid("max_redirects", "must not exceed 20"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !self.precache.is_empty() && !self.precache.iter().any(|p| p == &self.fallback_document) {
            tracing::warn!(
                fallback = %self.fallback_document,
                "precache override does not include the fallback document; \
                 offline navigations will have nothing to degrade to"
            );
        }

        Ok(())
    }
}
