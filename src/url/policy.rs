//! Crawl policy for harvested links
//!
//! Links that leave the audited host or point at editor, admin, feed, or
//! binary resources are filtered out silently; they are never errors.

use crate::url::domain::same_host;
use url::Url;

/// Path fragments of admin and login areas
const ADMIN_MARKERS: &[&str] = &[
    "/wp-admin",
    "/wp-login",
    "/admin",
    "/administrator",
    "/login",
    "/logout",
    "/user/login",
    "/cpanel",
];

/// Query keys and values that indicate a page builder or editor view
const EDITOR_MARKERS: &[&str] = &[
    "elementor-preview",
    "elementor_library",
    "action=edit",
    "preview=true",
    "preview_id=",
    "fl_builder",
    "et_fb=",
    "vc_editable",
    "customize_changeset",
];

/// Path fragments of syndication feeds
const FEED_MARKERS: &[&str] = &["/feed", "/rss", "/atom", "/comments/feed"];

/// File extensions that never contain an HTML page
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "tif", "tiff", "zip",
    "gz", "tar", "rar", "7z", "mp3", "mp4", "m4a", "mov", "avi", "wmv", "webm", "ogg", "wav",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "exe", "dmg", "apk", "css", "js",
    "json", "xml", "rss", "atom", "woff", "woff2", "ttf", "eot",
];

/// Returns true if a harvested link may join the discovery queue
///
/// The link must use HTTP(S), stay on the host of `base`, and not point at
/// an editor, admin, feed, or binary resource.
pub fn is_crawlable_link(link: &Url, base: &Url) -> bool {
    if link.scheme() != "http" && link.scheme() != "https" {
        return false;
    }

    if !same_host(link, base) {
        return false;
    }

    !is_editor_url(link) && !is_admin_url(link) && !is_feed_url(link) && !is_binary_url(link)
}

/// Returns true for page-builder and editor views
pub fn is_editor_url(url: &Url) -> bool {
    let query = url.query().unwrap_or("").to_lowercase();
    let path = url.path().to_lowercase();
    EDITOR_MARKERS
        .iter()
        .any(|marker| query.contains(marker) || path.contains(marker))
}

/// Returns true for admin and login areas
pub fn is_admin_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    ADMIN_MARKERS.iter().any(|marker| {
        path == *marker
            || path.starts_with(&format!("{}/", marker))
            || path.starts_with(&format!("{}.", marker))
    })
}

/// Returns true for RSS/Atom feeds
pub fn is_feed_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let path = path.trim_end_matches('/');
    FEED_MARKERS.iter().any(|marker| path.ends_with(marker))
        || url
            .query_pairs()
            .any(|(key, _)| key.eq_ignore_ascii_case("feed"))
}

/// Returns true if the path ends in a known non-HTML file extension
pub fn is_binary_url(url: &Url) -> bool {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    fn crawlable(link: &str) -> bool {
        is_crawlable_link(&Url::parse(link).unwrap(), &base())
    }

    #[test]
    fn test_same_host_page_is_crawlable() {
        assert!(crawlable("https://example.com/services"));
        assert!(crawlable("http://example.com/about"));
    }

    #[test]
    fn test_third_party_host_is_rejected() {
        assert!(!crawlable("https://other.com/page"));
        assert!(!crawlable("https://cdn.example.com/page"));
    }

    #[test]
    fn test_admin_paths_are_rejected() {
        assert!(!crawlable("https://example.com/wp-admin/options.php"));
        assert!(!crawlable("https://example.com/wp-login.php"));
        assert!(!crawlable("https://example.com/admin"));
        assert!(crawlable("https://example.com/administration-services"));
    }

    #[test]
    fn test_editor_views_are_rejected() {
        assert!(!crawlable("https://example.com/page?elementor-preview=12"));
        assert!(!crawlable("https://example.com/post?action=edit"));
        assert!(!crawlable("https://example.com/?preview=true"));
    }

    #[test]
    fn test_feeds_are_rejected() {
        assert!(!crawlable("https://example.com/feed/"));
        assert!(!crawlable("https://example.com/blog/comments/feed"));
        assert!(crawlable("https://example.com/feedback"));
    }

    #[test]
    fn test_binaries_are_rejected() {
        assert!(!crawlable("https://example.com/files/report.PDF"));
        assert!(!crawlable("https://example.com/logo.png"));
        assert!(crawlable("https://example.com/page.html"));
    }

    #[test]
    fn test_non_http_scheme_is_rejected() {
        assert!(!is_crawlable_link(
            &Url::parse("ftp://example.com/file").unwrap(),
            &base()
        ));
    }
}
