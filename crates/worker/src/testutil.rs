//! Scripted stub fetcher and settings builders shared by worker tests.

use crate::worker::{OfflineCache, WorkerSettings};
use m360_client::{Bytes, FetchResponse, Fetcher, HeaderMap, OutboundRequest, StatusCode};
use m360_core::{AssetManifest, CacheDb, Error, InstallPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

/// A fetcher scripted per-URL, with a switchable "network down" mode.
///
/// Clones share state, so a test can keep a handle and flip the network
/// off after handing a clone to the worker.
#[derive(Clone, Default)]
pub struct StubFetcher {
    routes: Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>,
    offline: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, status: u16, body: &[u8]) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_vec()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every URL fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &OutboundRequest) -> Result<FetchResponse, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::HttpError(format!("network unreachable: {}", request.url)));
        }

        let scripted = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        match scripted {
            Some((status, body)) => Ok(FetchResponse {
                url: request.url.clone(),
                final_url: request.url.clone(),
                status: StatusCode::from_u16(status).unwrap(),
                content_type: None,
                bytes: Bytes::from(body),
                headers: HeaderMap::new(),
                fetch_ms: 1,
            }),
            None => Err(Error::HttpError(format!("no route for {}", request.url))),
        }
    }
}

pub fn settings(cache_name: &str, manifest: &[&str]) -> WorkerSettings {
    settings_with_policy(cache_name, manifest, InstallPolicy::AllOrNothing)
}

pub fn settings_with_policy(
    cache_name: &str, manifest: &[&str], install_policy: InstallPolicy,
) -> WorkerSettings {
    WorkerSettings {
        cache_name: cache_name.to_string(),
        origin: Url::parse("http://origin.test").unwrap(),
        api_prefix: "/api/".to_string(),
        fallback_document: "/index.html".to_string(),
        install_policy,
        manifest: AssetManifest::new(manifest.iter().map(|s| s.to_string()).collect()),
    }
}

/// An installed and activated worker whose manifest entries each answer
/// with `"<path> body"`.
pub async fn installed(
    cache_name: &str, manifest: &[&str],
) -> (OfflineCache<StubFetcher>, StubFetcher) {
    let stub = StubFetcher::new();
    for path in manifest {
        let url = format!("http://origin.test{path}");
        let body = format!("{path} body");
        stub.route(&url, 200, body.as_bytes());
    }

    let db = CacheDb::open_in_memory().await.unwrap();
    let mut worker = OfflineCache::new(db, stub.clone(), settings(cache_name, manifest));
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    (worker, stub)
}
