//! HTML parser for discovery
//!
//! This module extracts the handful of fields the frontier needs from each
//! fetched page:
//! - Title, first H1, meta description and meta robots
//! - Visible word count and a short content preview
//! - Links to follow (from <a> tags and canonical links)
//!
//! Full per-page analysis lives in the `analyzer` module.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Characters kept in a content preview
const PREVIEW_CHARS: usize = 200;

/// Elements whose text never counts as visible content
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Text of the first <h1>
    pub h1: Option<String>,

    /// Content of <meta name="description">
    pub meta_description: Option<String>,

    /// Content of <meta name="robots">
    pub robots: Option<String>,

    /// Number of whitespace-separated words of visible text
    pub word_count: usize,

    /// First characters of visible text
    pub content_preview: String,

    /// All links found on the page (absolute URLs)
    pub links: Vec<Url>,
}

/// Parses HTML content and extracts discovery fields
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only anchors
///
/// Host and path policy is applied by the caller.
///
/// # Example
///
/// ```
/// use seo_sweep::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let text = visible_text(&document);
    let content_preview = collapse_whitespace(&text)
        .chars()
        .take(PREVIEW_CHARS)
        .collect();

    ParsedPage {
        title: first_text(&document, "title"),
        h1: first_text(&document, "h1"),
        meta_description: meta_content(&document, "description"),
        robots: meta_content(&document, "robots"),
        word_count: text.split_whitespace().count(),
        content_preview,
        links: extract_links(&document, base_url),
    }
}

/// Selects every element matching a CSS selector
///
/// An invalid selector yields no elements.
pub(crate) fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Returns the trimmed text of an element
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Returns the trimmed text of the first element matching `css`, if non-empty
pub(crate) fn first_text(document: &Html, css: &str) -> Option<String> {
    select_all(document, css)
        .first()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

/// Returns the trimmed `content` of `<meta name="...">`, matched case-insensitively
pub(crate) fn meta_content(document: &Html, name: &str) -> Option<String> {
    select_all(document, "meta[name][content]")
        .into_iter()
        .find(|el| {
            el.value()
                .attr("name")
                .map(|n| n.eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Concatenates all text outside script, style and similar elements
pub(crate) fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });

        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    for element in select_all(document, "a[href]") {
        // Skip if it has the download attribute
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                links.push(absolute_url);
            }
        }
    }

    for element in select_all(document, "link[rel='canonical'][href]") {
        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_link(href, base_url) {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub(crate) fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url)
    } else {
        None
    }
}
