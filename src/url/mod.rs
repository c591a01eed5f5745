//! URL handling module for Seo-Sweep
//!
//! This module provides URL normalization, host comparison, and the crawl
//! policy that decides which harvested links may be followed.

mod domain;
mod normalize;
pub mod policy;

// Re-export main functions
pub use domain::{extract_domain, flip_protocol, same_host, site_root};
pub use normalize::normalize_url;
pub use policy::is_crawlable_link;

use crate::UrlError;
use url::Url;

/// Parses a user-supplied site address into a root URL
///
/// Bare domains get an `https://` scheme. Path, query and fragment are kept
/// so a caller may audit from a sub-path.
///
/// # Examples
///
/// ```
/// use seo_sweep::url::parse_site_url;
///
/// let url = parse_site_url("Example.com").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/");
/// ```
pub fn parse_site_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty site address".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    normalize_url(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_domain() {
        let url = parse_site_url("example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_parse_keeps_explicit_scheme() {
        let url = parse_site_url("http://example.com").unwrap();
        assert_eq!(url.as_str(), "http://example.com/");
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(parse_site_url("   ").is_err());
    }
}
