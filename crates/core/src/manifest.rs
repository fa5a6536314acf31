//! Asset manifest: the URLs precached at install time.

use crate::Error;
use serde::{Deserialize, Serialize};
use url::Url;

/// Ordered list of asset URLs fetched eagerly when a generation installs.
///
/// Entries are either absolute URLs (third-party stylesheets and scripts)
/// or site-relative paths resolved against the configured origin. The list
/// is static for the lifetime of a generation; changing it means shipping
/// a new cache version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    urls: Vec<String>,
}

impl AssetManifest {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }

    /// The deployment's built-in static asset list: the HTML entry point,
    /// stylesheet, script bundle, and the third-party font, panorama, and
    /// map libraries.
    pub fn default_assets() -> Self {
        Self::new(
            [
                "/",
                "/index.html",
                "/css/styles.css",
                "/js/app.js",
                "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;600;800&display=swap",
                "https://unpkg.com/pannellum/build/pannellum.css",
                "https://unpkg.com/pannellum/build/pannellum.js",
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css",
                "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        )
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Resolve every entry to an absolute URL against the site origin.
    ///
    /// Absolute http(s) entries pass through untouched; anything with a
    /// different scheme is rejected rather than silently skipped, since a
    /// manifest typo would otherwise go unnoticed until a cache miss in
    /// production.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, Error> {
        self.urls
            .iter()
            .map(|entry| match Url::parse(entry) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
                Ok(url) => Err(Error::InvalidUrl(format!(
                    "manifest entry {entry}: unsupported scheme {}",
                    url.scheme()
                ))),
                Err(url::ParseError::RelativeUrlWithoutBase) => origin
                    .join(entry)
                    .map_err(|e| Error::InvalidUrl(format!("manifest entry {entry}: {e}"))),
                Err(e) => Err(Error::InvalidUrl(format!("manifest entry {entry}: {e}"))),
            })
            .collect()
    }
}
