//! The offline cache worker: install, activate, and request handling.

use crate::lifecycle::Phase;
use crate::strategy::{self, Destination, RouteClass};
use m360_client::{Bytes, FetchResponse, Fetcher, OutboundRequest, canonicalize};
use m360_core::cache::key::request_key;
use m360_core::{AppConfig, AssetManifest, CacheDb, Error, InstallPolicy, StoredResponse};
use url::Url;

/// Resolved settings the worker needs at runtime.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Name of the current generation; doubles as the version string.
    pub cache_name: String,
    /// Origin of the fronted site.
    pub origin: Url,
    /// Path prefix routed network-first.
    pub api_prefix: String,
    /// Document served for failed navigations while offline.
    pub fallback_document: String,
    pub install_policy: InstallPolicy,
    pub manifest: AssetManifest,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            cache_name: config.cache_name.clone(),
            origin,
            api_prefix: config.api_prefix.clone(),
            fallback_document: config.fallback_document.clone(),
            install_policy: config.install_policy,
            manifest: config.manifest(),
        })
    }
}

/// A request offered to the worker for interception.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    pub body: Option<Bytes>,
}

impl WorkerRequest {
    pub fn get(url: Url, destination: Destination) -> Self {
        Self { method: "GET".to_string(), url, destination, body: None }
    }

    pub(crate) fn outbound(&self) -> OutboundRequest {
        OutboundRequest { method: self.method.clone(), url: self.url.clone(), body: self.body.clone() }
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
    Fallback,
}

/// Response handed back to the intercepted client.
#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: Source,
}

/// Outcome of an install pass over the manifest.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallReport {
    pub cached: usize,
    pub failed: usize,
}

/// The offline cache worker.
///
/// Owns the cache database, the network fetcher, and the resolved settings.
/// `install` and `activate` drive the lifecycle before the gateway starts
/// serving; `handle` answers intercepted requests once the worker is
/// active.
pub struct OfflineCache<F> {
    pub(crate) db: CacheDb,
    pub(crate) fetcher: F,
    pub(crate) settings: WorkerSettings,
    phase: Phase,
}

impl<F: Fetcher> OfflineCache<F> {
    pub fn new(db: CacheDb, fetcher: F, settings: WorkerSettings) -> Self {
        Self { db, fetcher, settings, phase: Phase::Installing }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Precache the asset manifest into the generation named by
    /// `cache_name`.
    ///
    /// Every manifest URL is fetched in order; 2xx responses are written as
    /// entries. What happens on a failed asset depends on the configured
    /// policy: all-or-nothing aborts the install on the first failure
    /// (leaving any previously active generation untouched), best-effort
    /// logs and moves on, failing only if nothing at all could be cached.
    pub async fn install(&mut self) -> Result<InstallReport, Error> {
        let generation = self.settings.cache_name.clone();
        self.db.open_generation(&generation).await?;

        let assets = self.settings.manifest.resolve(&self.settings.origin)?;
        tracing::info!(%generation, assets = assets.len(), "installing");

        let mut report = InstallReport::default();
        for url in &assets {
            let failure = match self.fetcher.fetch(&OutboundRequest::get(url.clone())).await {
                Ok(response) if response.status.is_success() => {
                    self.store("GET", url, &response).await?;
                    report.cached += 1;
                    None
                }
                Ok(response) => Some(format!("{url}: status {}", response.status.as_u16())),
                Err(err) => Some(format!("{url}: {err}")),
            };

            if let Some(reason) = failure {
                match self.settings.install_policy {
                    InstallPolicy::AllOrNothing => return Err(Error::ManifestFetch(reason)),
                    InstallPolicy::BestEffort => {
                        tracing::warn!(%reason, "manifest asset skipped");
                        report.failed += 1;
                    }
                }
            }
        }

        if report.cached == 0 && report.failed > 0 {
            return Err(Error::ManifestFetch(format!(
                "all {} manifest assets failed",
                report.failed
            )));
        }

        self.phase = self.phase.advance(Phase::Waiting)?;
        tracing::info!(%generation, cached = report.cached, "install complete");
        Ok(report)
    }

    /// Sweep stale generations and take over request handling.
    ///
    /// After this returns, the generation named by `cache_name` is the only
    /// one reachable; the old ones and their entries are gone in the same
    /// statement. Returns the number of generations deleted.
    pub async fn activate(&mut self) -> Result<u64, Error> {
        self.phase = self.phase.advance(Phase::Activating)?;

        let swept = self.db.sweep_generations(&self.settings.cache_name).await?;
        if swept > 0 {
            tracing::info!(swept, keep = %self.settings.cache_name, "deleted old generations");
        }

        self.phase = self.phase.advance(Phase::Active)?;
        Ok(swept)
    }

    /// Answer an intercepted request.
    ///
    /// Routing: non-HTTP schemes are never intercepted; paths under the API
    /// prefix go network-first; everything else goes cache-first with an
    /// offline fallback document for failed navigations.
    pub async fn handle(&self, request: &WorkerRequest) -> Result<ServedResponse, Error> {
        if self.phase != Phase::Active {
            return Err(Error::InvalidInput(format!("worker is {}, not active", self.phase)));
        }

        match strategy::classify(&request.url, &self.settings.api_prefix) {
            RouteClass::Passthrough => Err(Error::NotControlled(request.url.scheme().to_string())),
            RouteClass::NetworkFirst => self.network_first(request).await,
            RouteClass::CacheFirst => self.cache_first(request).await,
        }
    }

    /// Write a fetched response into the current generation.
    ///
    /// Bodies are stored as the exact bytes received; the entry replaces
    /// any previous one under the same key.
    pub(crate) async fn store(
        &self, method: &str, url: &Url, response: &FetchResponse,
    ) -> Result<(), Error> {
        let entry = StoredResponse {
            key: request_key(method, url.as_str(), ""),
            method: method.to_string(),
            url: url.to_string(),
            status: response.status.as_u16(),
            headers_json: strategy::headers_to_json(&response.headers),
            body: response.bytes.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        self.db.put_entry(&self.settings.cache_name, &entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{StubFetcher, settings, settings_with_policy};
    use m360_core::cache::key::request_key;

    const V1: &str = "monastery360-v1.0.0";
    const V2: &str = "monastery360-v2.0.0";

    #[tokio::test]
    async fn test_install_precaches_manifest_in_order() {
        let stub = StubFetcher::new();
        stub.route("http://origin.test/", 200, b"<html>home</html>");
        stub.route("http://origin.test/css/styles.css", 200, b"body{}");

        let db = CacheDb::open_in_memory().await.unwrap();
        let mut worker =
            OfflineCache::new(db.clone(), stub.clone(), settings(V1, &["/", "/css/styles.css"]));

        let report = worker.install().await.unwrap();
        assert_eq!(report.cached, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(worker.phase(), crate::lifecycle::Phase::Waiting);
        assert_eq!(db.count_entries(V1).await.unwrap(), 2);
        assert_eq!(
            stub.calls(),
            vec!["http://origin.test/", "http://origin.test/css/styles.css"]
        );
    }

    #[tokio::test]
    async fn test_install_all_or_nothing_aborts_on_unreachable_asset() {
        let stub = StubFetcher::new();
        stub.route("http://origin.test/", 200, b"home");
        // "/js/app.js" has no route and fails.

        let db = CacheDb::open_in_memory().await.unwrap();

        // A previously active generation with content.
        db.open_generation(V1).await.unwrap();
        let old = StoredResponse {
            key: request_key("GET", "http://origin.test/", ""),
            method: "GET".into(),
            url: "http://origin.test/".into(),
            status: 200,
            headers_json: "[]".into(),
            body: b"v1 home".to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        db.put_entry(V1, &old).await.unwrap();

        let mut worker =
            OfflineCache::new(db.clone(), stub.clone(), settings(V2, &["/", "/js/app.js"]));
        let result = worker.install().await;
        assert!(matches!(result, Err(Error::ManifestFetch(_))));
        assert_eq!(worker.phase(), crate::lifecycle::Phase::Installing);

        // The old generation is untouched and still queryable.
        let survivor = db.get_entry(V1, &old.key).await.unwrap().unwrap();
        assert_eq!(survivor.body, b"v1 home");
    }

    #[tokio::test]
    async fn test_install_best_effort_caches_reachable_subset() {
        let stub = StubFetcher::new();
        stub.route("http://origin.test/", 200, b"home");

        let db = CacheDb::open_in_memory().await.unwrap();
        let mut worker = OfflineCache::new(
            db.clone(),
            stub,
            settings_with_policy(V1, &["/", "/js/app.js"], InstallPolicy::BestEffort),
        );

        let report = worker.install().await.unwrap();
        assert_eq!(report.cached, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(db.count_entries(V1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_install_best_effort_fails_when_nothing_cached() {
        let stub = StubFetcher::new();
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut worker = OfflineCache::new(
            db,
            stub,
            settings_with_policy(V1, &["/", "/js/app.js"], InstallPolicy::BestEffort),
        );

        let result = worker.install().await;
        assert!(matches!(result, Err(Error::ManifestFetch(_))));
    }

    #[tokio::test]
    async fn test_install_all_or_nothing_rejects_non_2xx() {
        let stub = StubFetcher::new();
        stub.route("http://origin.test/", 404, b"gone");

        let db = CacheDb::open_in_memory().await.unwrap();
        let mut worker = OfflineCache::new(db, stub, settings(V1, &["/"]));
        let result = worker.install().await;
        assert!(matches!(result, Err(Error::ManifestFetch(_))));
    }

    #[tokio::test]
    async fn test_activate_sweeps_old_generations() {
        let stub = StubFetcher::new();
        stub.route("http://origin.test/", 200, b"v2 home");

        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_generation(V1).await.unwrap();
        let old = StoredResponse {
            key: request_key("GET", "http://origin.test/", ""),
            method: "GET".into(),
            url: "http://origin.test/".into(),
            status: 200,
            headers_json: "[]".into(),
            body: b"v1 home".to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        db.put_entry(V1, &old).await.unwrap();

        let mut worker = OfflineCache::new(db.clone(), stub, settings(V2, &["/"]));
        worker.install().await.unwrap();
        let swept = worker.activate().await.unwrap();

        assert_eq!(swept, 1);
        assert_eq!(db.list_generations().await.unwrap(), vec![V2]);
        assert!(db.get_entry(V1, &old.key).await.unwrap().is_none());
        assert_eq!(worker.phase(), crate::lifecycle::Phase::Active);
    }

    #[tokio::test]
    async fn test_handle_requires_active_phase() {
        let stub = StubFetcher::new();
        stub.route("http://origin.test/", 200, b"home");

        let db = CacheDb::open_in_memory().await.unwrap();
        let mut worker = OfflineCache::new(db, stub, settings(V1, &["/"]));
        worker.install().await.unwrap();

        let request = WorkerRequest::get(
            Url::parse("http://origin.test/").unwrap(),
            Destination::Document,
        );
        let result = worker.handle(&request).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_non_http_scheme_never_intercepted() {
        let stub = StubFetcher::new();
        stub.route("http://origin.test/", 200, b"home");

        let db = CacheDb::open_in_memory().await.unwrap();
        let mut worker = OfflineCache::new(db.clone(), stub.clone(), settings(V1, &["/"]));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();

        let calls_before = stub.calls().len();
        let entries_before = db.count_entries(V1).await.unwrap();

        let request = WorkerRequest::get(
            Url::parse("data:text/plain,hello").unwrap(),
            Destination::Asset,
        );
        let result = worker.handle(&request).await;

        assert!(matches!(result, Err(Error::NotControlled(_))));
        // No cache read/write side effects, no network call.
        assert_eq!(stub.calls().len(), calls_before);
        assert_eq!(db.count_entries(V1).await.unwrap(), entries_before);
    }

    #[tokio::test]
    async fn test_install_with_empty_manifest_is_noop() {
        let stub = StubFetcher::new();
        let db = CacheDb::open_in_memory().await.unwrap();
        let mut worker = OfflineCache::new(db.clone(), stub, settings(V1, &[]));

        let report = worker.install().await.unwrap();
        assert_eq!(report.cached, 0);
        assert_eq!(db.count_entries(V1).await.unwrap(), 0);
        assert_eq!(worker.phase(), crate::lifecycle::Phase::Waiting);
    }
}
