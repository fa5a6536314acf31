//! Upstream HTTP fetching with explicit timeout and size limits.
//!
//! The original interception runtime had no fetch timeout at all, so a hung
//! upstream stalled a request forever; every fetch here is bounded. Requests
//! are sent without cookies or stored credentials, matching the
//! credential-free install fetches of the deployment this replaces.

pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use url::UrlError;

use m360_core::Error;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "m360-offline/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "m360-offline/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20_000),
            max_redirects: 5,
        }
    }
}

/// A request headed for the network.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: String,
    pub url: Url,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// A plain GET, the shape of every precache and static-asset fetch.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, body: None }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Whether the response landed on the given origin, judged on the final
    /// URL after redirects. This is the cacheability gate for static
    /// assets: cross-origin responses are served but never stored.
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.final_url.scheme() == origin.scheme()
            && self.final_url.host_str() == origin.host_str()
            && self.final_url.port_or_known_default() == origin.port_or_known_default()
    }
}

/// The worker's seam to the network.
///
/// The routing strategies are written against this trait rather than a
/// concrete client, so tests can script upstream behavior (including
/// outages) without a socket. Any HTTP status is a successful fetch; what a
/// non-200 means is the caching policy's decision, not the transport's.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &OutboundRequest) -> Result<FetchResponse, Error>;
}

/// HTTP fetch client over a shared connection pool.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &OutboundRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(Error::NotControlled(request.url.scheme().to_string()));
        }

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("bad method: {}", request.method)))?;

        let mut outbound = self.http.request(method, request.url.clone());
        if let Some(body) = &request.body {
            outbound = outbound.body(body.clone());
        }

        let response = outbound.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {e}", request.url))
            } else {
                Error::HttpError(format!("network error: {e}"))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!(
                "{len} bytes exceeds {}",
                self.config.max_bytes
            )));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} in {}ms (status {}, {} bytes)",
            request.url,
            final_url,
            fetch_ms,
            status.as_u16(),
            bytes.len()
        );

        Ok(FetchResponse {
            url: request.url.clone(),
            final_url,
            status,
            content_type,
            bytes,
            headers,
            fetch_ms,
        })
    }
}
