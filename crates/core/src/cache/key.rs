//! Request keying for cache entries.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request.
///
/// The key covers the method, the canonical URL, and whatever headers the
/// caller considers significant for response variance (usually empty).
/// Hashing keeps keys fixed-width and index-friendly regardless of URL
/// length.
pub fn request_key(method: &str, url: &str, vary: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [method, url, vary] {
        hasher.update(part.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
