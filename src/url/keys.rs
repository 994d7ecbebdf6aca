use sha2::{Digest, Sha256};
use url::Url;

/// Computes the content-address key for a URL
///
/// The key is the hex-encoded SHA-256 of the full normalized URL string.
/// Every fetch of the same normalized URL maps to the same content identity
/// through this key, which is what deduplicates repeated crawls.
///
/// # Examples
///
/// ```
/// use chitin::url::{normalize_url, url_key};
///
/// let a = url_key(&normalize_url("https://example.com/page#x").unwrap());
/// let b = url_key(&normalize_url("https://EXAMPLE.com/page").unwrap());
/// assert_eq!(a, b);
/// ```
pub fn url_key(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the key for a host
///
/// Used by the blocklist and the per-host statistics table. The host is
/// lowercased before hashing so differently-cased spellings collapse to one
/// row.
pub fn host_key(host: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(host.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_key_is_hex_sha256() {
        let url = Url::parse("https://example.com/").unwrap();
        let key = url_key(&url);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_url_key_stable() {
        let url = Url::parse("https://example.com/a").unwrap();
        assert_eq!(url_key(&url), url_key(&url));
    }

    #[test]
    fn test_different_urls_different_keys() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com/b").unwrap();
        assert_ne!(url_key(&a), url_key(&b));
    }

    #[test]
    fn test_host_key_case_insensitive() {
        assert_eq!(host_key("Example.COM"), host_key("example.com"));
    }

    #[test]
    fn test_host_key_distinct_hosts() {
        assert_ne!(host_key("example.com"), host_key("example.org"));
    }
}
