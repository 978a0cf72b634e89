use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pantopod::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the authority of a URL: the lowercase host plus any explicit port
///
/// Default ports are not part of the authority (`http://a.com:80/` and
/// `http://a.com/` share the authority `a.com`).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pantopod::url::authority;
///
/// let url = Url::parse("http://example.com:8080/page").unwrap();
/// assert_eq!(authority(&url), "example.com:8080");
/// ```
pub fn authority(url: &Url) -> String {
    let host = extract_domain(url).unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}
