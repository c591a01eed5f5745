//! Sitemap seeding
//!
//! Before the breadth-first crawl starts, the frontier reads the site's XML
//! sitemap and seeds its queue with the page URLs it lists. Sitemap indexes
//! are followed one level deep.

use crate::crawler::Fetcher;
use crate::url::{is_crawlable_link, site_root};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};
use url::Url;

/// Well-known sitemap locations, tried in order
pub const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemap-index.xml"];

/// Child sitemaps read from a sitemap index
pub const MAX_CHILD_SITEMAPS: usize = 5;

static LOC_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn loc_pattern() -> Option<&'static Regex> {
    LOC_PATTERN
        .get_or_init(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").ok())
        .as_ref()
}

/// Extracts the `<loc>` values of a sitemap document
///
/// CDATA wrappers and the XML entities that appear in URLs are decoded.
pub fn extract_locs(xml: &str) -> Vec<String> {
    let Some(pattern) = loc_pattern() else {
        return Vec::new();
    };

    pattern
        .captures_iter(xml)
        .filter_map(|cap| cap.get(1))
        .map(|m| decode_loc(m.as_str()))
        .filter(|loc| !loc.is_empty())
        .collect()
}

fn decode_loc(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches("<![CDATA[")
        .trim_end_matches("]]>")
        .trim();
    trimmed
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

/// Returns true if the document is a sitemap index rather than a URL set
pub fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

/// Finds the site's sitemap
///
/// The well-known locations are tried first; the first one that answers 2xx
/// wins. If none does, each of `declared` (from robots.txt) is tried in turn.
///
/// # Returns
///
/// * `Some((location, body))` - The sitemap that answered
/// * `None` - No candidate answered 2xx
pub async fn locate_sitemap(
    fetcher: &Fetcher,
    base_url: &Url,
    declared: &[String],
) -> Option<(String, String)> {
    let root = site_root(base_url);
    let mut candidates: Vec<String> = SITEMAP_PATHS
        .iter()
        .filter_map(|path| root.join(path).ok())
        .map(|u| u.to_string())
        .collect();
    candidates.extend(declared.iter().cloned());

    for candidate in candidates {
        match fetcher
            .fetch_text(&candidate, fetcher.discovery_timeout())
            .await
        {
            Ok(body) => {
                debug!(sitemap = %candidate, "Sitemap found");
                return Some((candidate, body));
            }
            Err(e) => debug!(sitemap = %candidate, error = %e, "Sitemap unavailable"),
        }
    }

    None
}

/// Reads the site's sitemap and returns up to `limit` crawlable page URLs
///
/// Every failure is logged and skipped; an unreadable sitemap yields an
/// empty list rather than an error.
pub async fn collect_sitemap_urls(
    fetcher: &Fetcher,
    base_url: &Url,
    declared: &[String],
    limit: usize,
) -> Vec<Url> {
    let Some((_, document)) = locate_sitemap(fetcher, base_url, declared).await else {
        return Vec::new();
    };

    let page_locs = if is_sitemap_index(&document) {
        let mut locs = Vec::new();
        for child in extract_locs(&document).into_iter().take(MAX_CHILD_SITEMAPS) {
            match fetcher.fetch_text(&child, fetcher.discovery_timeout()).await {
                // One level only: nested indexes contribute nothing
                Ok(body) if !is_sitemap_index(&body) => locs.extend(extract_locs(&body)),
                Ok(_) => debug!(sitemap = %child, "Skipping nested sitemap index"),
                Err(e) => debug!(sitemap = %child, error = %e, "Child sitemap unavailable"),
            }
        }
        locs
    } else {
        extract_locs(&document)
    };

    let urls: Vec<Url> = page_locs
        .iter()
        .filter_map(|loc| Url::parse(loc).ok())
        .filter(|url| is_crawlable_link(url, base_url))
        .take(limit)
        .collect();

    info!(count = urls.len(), "Seeded URLs from sitemap");
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_locs() {
        let xml = r#"<?xml version="1.0"?>
            <urlset>
              <url><loc>https://example.com/</loc></url>
              <url><loc>
                https://example.com/about
              </loc></url>
              <url><LOC>https://example.com/upper</LOC></url>
            </urlset>"#;
        assert_eq!(
            extract_locs(xml),
            vec![
                "https://example.com/",
                "https://example.com/about",
                "https://example.com/upper"
            ]
        );
    }

    #[test]
    fn test_extract_locs_decodes_entities_and_cdata() {
        let xml = "<urlset><url><loc><![CDATA[https://example.com/a]]></loc></url>\
                   <url><loc>https://example.com/b?x=1&amp;y=2</loc></url></urlset>";
        assert_eq!(
            extract_locs(xml),
            vec!["https://example.com/a", "https://example.com/b?x=1&y=2"]
        );
    }

    #[test]
    fn test_detect_sitemap_index() {
        assert!(is_sitemap_index(
            "<sitemapindex><sitemap><loc>https://example.com/s1.xml</loc></sitemap></sitemapindex>"
        ));
        assert!(!is_sitemap_index("<urlset></urlset>"));
    }

    #[tokio::test]
    async fn test_collect_follows_index_one_level() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<sitemapindex><sitemap><loc>{base}/pages.xml</loc></sitemap></sitemapindex>"
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pages.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<urlset><url><loc>{base}/a</loc></url><url><loc>{base}/b</loc></url>\
                 <url><loc>https://elsewhere.com/c</loc></url><url><loc>{base}/d</loc></url></urlset>"
            )))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let base_url = Url::parse(&base).unwrap();
        let urls = collect_sitemap_urls(&fetcher, &base_url, &[], 2).await;

        let paths: Vec<&str> = urls.iter().map(|u| u.path()).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }

    #[tokio::test]
    async fn test_declared_sitemap_used_as_fallback() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/custom-map.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<urlset><url><loc>{base}/x</loc></url></urlset>"
            )))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let base_url = Url::parse(&base).unwrap();
        let declared = vec![format!("{base}/custom-map.xml")];

        let located = locate_sitemap(&fetcher, &base_url, &declared).await;
        assert_eq!(located.map(|(loc, _)| loc), Some(declared[0].clone()));

        let urls = collect_sitemap_urls(&fetcher, &base_url, &declared, 150).await;
        assert_eq!(urls.len(), 1);
    }
}
