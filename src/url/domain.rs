use url::Url;

/// Extracts the host from a URL
///
/// Returns the lowercase host portion, which is what the blocklist and the
/// per-host politeness counters are keyed on. Returns None for URLs without
/// a host (which cannot happen for valid HTTP(S) URLs).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use chitin::url::extract_host;
///
/// let url = Url::parse("https://Sub.Example.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://api.v2.example.com/endpoint").unwrap();
        assert_eq!(extract_host(&url), Some("api.v2.example.com".to_string()));
    }

    #[test]
    fn test_extract_lowercases() {
        let url = Url::parse("https://EXAMPLE.com/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_port_not_included() {
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }
}
