//! URL canonicalization for stable cache keys.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string so equivalent requests map to the same key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default the scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Strip the fragment
/// 5. Keep the query string intact (no reordering)
///
/// Only `http` and `https` pass; every other scheme is rejected with
/// `UnsupportedScheme`, which is what keeps non-HTTP requests out of the
/// worker entirely.
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let with_scheme =
        if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed =
        url::Url::parse(&with_scheme).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("http://origin.test/css/styles.css").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/css/styles.css");
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("origin.test").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://ORIGIN.Test/Path").unwrap();
        assert_eq!(url.host_str(), Some("origin.test"));
        // Path case is significant and untouched.
        assert_eq!(url.path(), "/Path");
    }

    #[test]
    fn test_canonicalize_strips_fragment_keeps_query() {
        let url = canonicalize("https://origin.test/archive?type=mural#top").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("type=mural"));
    }

    #[test]
    fn test_canonicalize_trims_whitespace() {
        let url = canonicalize("  https://origin.test  ").unwrap();
        assert_eq!(url.as_str(), "https://origin.test/");
    }

    #[test]
    fn test_canonicalize_rejects_non_http_schemes() {
        for input in ["data:text/plain,hi", "chrome-extension://abc/x.js", "file:///etc/hosts"] {
            let result = canonicalize(input);
            assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))), "accepted {input}");
        }
    }

    #[test]
    fn test_canonicalize_empty_and_blank() {
        assert!(matches!(canonicalize(""), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }
}
