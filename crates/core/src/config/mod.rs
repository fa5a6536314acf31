//! Application configuration with layered loading.
//!
//! Configuration is assembled from three sources using figment:
//!
//! 1. Environment variables (M360_*)
//! 2. TOML config file (if M360_CONFIG_FILE is set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::manifest::AssetManifest;

mod validation;

pub use validation::ConfigError;

/// Install failure policy for manifest precaching.
///
/// `AllOrNothing` reproduces the deployed behavior: one unreachable asset
/// aborts the whole install and the previous generation stays in control.
/// `BestEffort` caches whatever succeeded and logs the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
    #[default]
    AllOrNothing,
    BestEffort,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (M360_*)
/// 2. TOML config file (if M360_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache generation. Bumping this on deploy is the
    /// sole cache-invalidation mechanism; the old generation is swept on
    /// activation.
    ///
    /// Set via M360_CACHE_NAME.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Path to the SQLite cache database.
    ///
    /// Set via M360_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Base URL of the fronted site. Relative manifest entries and
    /// intercepted request paths resolve against this.
    ///
    /// Set via M360_ORIGIN.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Bind address for the interception gateway.
    ///
    /// Set via M360_LISTEN_ADDR.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path prefix routed network-first.
    ///
    /// Set via M360_API_PREFIX.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Document served for failed navigations while offline.
    ///
    /// Set via M360_FALLBACK_DOCUMENT.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// Manifest override. Empty means the built-in default asset list.
    ///
    /// Set via M360_PRECACHE (or the config file).
    #[serde(default)]
    pub precache: Vec<String>,

    /// Install failure policy.
    ///
    /// Set via M360_INSTALL_POLICY ("all-or-nothing" or "best-effort").
    #[serde(default)]
    pub install_policy: InstallPolicy,

    /// User-Agent string for upstream requests.
    ///
    /// Set via M360_USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via M360_MAX_BYTES.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via M360_TIMEOUT_MS.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects to follow upstream.
    ///
    /// Set via M360_MAX_REDIRECTS.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_cache_name() -> String {
    "monastery360-v1.0.0".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./m360-offline-cache.sqlite")
}

fn default_origin() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3360".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_fallback_document() -> String {
    "/index.html".into()
}

fn default_user_agent() -> String {
    "m360-offline/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            db_path: default_db_path(),
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            api_prefix: default_api_prefix(),
            fallback_document: default_fallback_document(),
            precache: Vec::new(),
            install_policy: InstallPolicy::default(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The effective asset manifest: the configured override, or the
    /// built-in default list when no override is set.
    pub fn manifest(&self) -> AssetManifest {
        if self.precache.is_empty() {
            AssetManifest::default_assets()
        } else {
            AssetManifest::new(self.precache.clone())
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `M360_`
    /// 2. TOML file from `M360_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("M360_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("M360_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
