use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host portion, or None if the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_sweep::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at the same host, ignoring scheme and port
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Returns the same URL with the opposite HTTP scheme
///
/// An explicit port is kept; only the scheme changes.
pub fn flip_protocol(url: &Url) -> Option<Url> {
    let target = match url.scheme() {
        "http" => "https",
        "https" => "http",
        _ => return None,
    };

    let mut flipped = url.clone();
    flipped.set_scheme(target).ok()?;
    Some(flipped)
}

/// Returns the site root (`scheme://host[:port]/`) of a URL
pub fn site_root(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}
