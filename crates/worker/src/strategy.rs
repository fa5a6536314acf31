//! Request routing strategies.
//!
//! Two strategies cover everything the worker intercepts: API-namespaced
//! paths go network-first (fresh data when reachable, cached data when
//! offline), all other paths go cache-first (precached assets served
//! without revalidation until the generation is swept). Failed navigations
//! degrade to the configured fallback document instead of an error page.

use crate::worker::{OfflineCache, ServedResponse, Source, WorkerRequest};
use m360_client::{FetchResponse, Fetcher, HeaderMap};
use m360_core::cache::key::request_key;
use m360_core::{Error, StoredResponse};
use url::Url;

/// What kind of resource the client is navigating to.
///
/// `Document` marks a full-page navigation, which is the only case that
/// gets the offline fallback treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Asset,
}

/// Routing decision for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    NetworkFirst,
    CacheFirst,
    Passthrough,
}

/// Classify a request URL.
///
/// Non-HTTP schemes are passed through untouched; the API namespace is
/// network-first; everything else is a static asset.
pub fn classify(url: &Url, api_prefix: &str) -> RouteClass {
    if !matches!(url.scheme(), "http" | "https") {
        return RouteClass::Passthrough;
    }
    if url.path().starts_with(api_prefix) {
        RouteClass::NetworkFirst
    } else {
        RouteClass::CacheFirst
    }
}

/// Serialize response headers as JSON pairs for storage.
///
/// Header values that are not valid UTF-8 are dropped rather than
/// corrupted.
pub(crate) fn headers_to_json(headers: &HeaderMap) -> String {
    let pairs: Vec<(String, String)> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    serde_json::to_string(&pairs).unwrap_or_else(|_| "[]".to_string())
}

impl ServedResponse {
    fn from_network(response: &FetchResponse) -> Self {
        let headers: Vec<(String, String)> = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self {
            status: response.status.as_u16(),
            headers,
            body: response.bytes.to_vec(),
            source: Source::Network,
        }
    }

    fn from_entry(entry: StoredResponse, source: Source) -> Self {
        let headers: Vec<(String, String)> =
            serde_json::from_str(&entry.headers_json).unwrap_or_default();
        Self { status: entry.status, headers, body: entry.body, source }
    }
}

impl<F: Fetcher> OfflineCache<F> {
    /// Network-first: try upstream, store a 200 for offline replay, fall
    /// back to the cache when the network is down.
    ///
    /// A cache write failure never aborts the response that triggered it.
    pub(crate) async fn network_first(
        &self, request: &WorkerRequest,
    ) -> Result<ServedResponse, Error> {
        let key = request_key(&request.method, request.url.as_str(), "");

        match self.fetcher.fetch(&request.outbound()).await {
            Ok(response) => {
                if response.status.as_u16() == 200 && request.method == "GET" {
                    if let Err(err) = self.store(&request.method, &request.url, &response).await {
                        tracing::warn!(url = %request.url, %err, "cache write failed, serving network response anyway");
                    }
                }
                Ok(ServedResponse::from_network(&response))
            }
            Err(fetch_err) => {
                tracing::debug!(url = %request.url, %fetch_err, "network unavailable, trying cache");
                match self.db.get_entry(&self.settings.cache_name, &key).await? {
                    Some(entry) => Ok(ServedResponse::from_entry(entry, Source::Cache)),
                    None => {
                        Err(Error::CacheMiss(format!("offline with no entry for {}", request.url)))
                    }
                }
            }
        }
    }

    /// Cache-first: serve a hit verbatim with no revalidation; on a miss,
    /// fetch and store successful same-origin responses; for a failed
    /// navigation, degrade to the cached fallback document.
    pub(crate) async fn cache_first(
        &self, request: &WorkerRequest,
    ) -> Result<ServedResponse, Error> {
        let key = request_key(&request.method, request.url.as_str(), "");

        if let Some(entry) = self.db.get_entry(&self.settings.cache_name, &key).await? {
            return Ok(ServedResponse::from_entry(entry, Source::Cache));
        }

        match self.fetcher.fetch(&request.outbound()).await {
            Ok(response) => {
                if response.status.is_success()
                    && request.method == "GET"
                    && response.is_same_origin(&self.settings.origin)
                {
                    if let Err(err) = self.store(&request.method, &request.url, &response).await {
                        tracing::warn!(url = %request.url, %err, "cache write failed, serving network response anyway");
                    }
                }
                Ok(ServedResponse::from_network(&response))
            }
            Err(fetch_err) => {
                if request.destination == Destination::Document {
                    let fallback = self
                        .settings
                        .origin
                        .join(&self.settings.fallback_document)
                        .map_err(|e| Error::InvalidUrl(e.to_string()))?;
                    let fallback_key = request_key("GET", fallback.as_str(), "");
                    if let Some(entry) =
                        self.db.get_entry(&self.settings.cache_name, &fallback_key).await?
                    {
                        tracing::debug!(url = %request.url, "offline navigation, serving fallback document");
                        return Ok(ServedResponse::from_entry(entry, Source::Fallback));
                    }
                }
                Err(fetch_err)
            }
        }
    }
}
