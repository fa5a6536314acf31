//! Unified error types for the offline cache worker.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the cache, the fetch pipeline, and the worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input (bad configuration value, malformed manifest entry,
    /// or an operation issued in the wrong lifecycle phase).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A manifest asset could not be precached during install.
    #[error("MANIFEST_FETCH: {0}")]
    ManifestFetch(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Request scheme is outside the worker's control (not http/https).
    #[error("NOT_CONTROLLED: {0}")]
    NotControlled(String),

    /// Network request failed.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch timed out.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response exceeded the configured size limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_codes() {
        let err = Error::CacheMiss("http://origin.test/api/events".to_string());
        assert!(err.to_string().starts_with("CACHE_MISS:"));
        assert!(err.to_string().contains("/api/events"));
    }

    #[test]
    fn test_manifest_fetch_display() {
        let err = Error::ManifestFetch("/css/styles.css: status 404".to_string());
        assert!(err.to_string().starts_with("MANIFEST_FETCH:"));
    }

    #[test]
    fn test_not_controlled_carries_scheme() {
        let err = Error::NotControlled("data".to_string());
        assert_eq!(err.to_string(), "NOT_CONTROLLED: data");
    }
}
