//! Field extraction from a fetched HTML document
//!
//! Everything here is synchronous and returns owned data; the parsed
//! document never outlives `extract_page`, so callers can hold the result
//! across await points.

use super::types::{
    ContentBlock, ContentSummary, Heading, Headings, ImageDetail, ImageSummary, InternalLink,
    LinkDetail, LinkSummary, MetaData, Performance, ResourceCounts, SocialTags, StructuredData,
    TextField,
};
use crate::crawler::{
    collapse_whitespace, element_text, first_text, meta_content, resolve_link, select_all,
    visible_text,
};
use crate::url::{normalize_url, same_host};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Candidate containers for the primary content, in preference order
const CONTENT_CONTAINERS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    "#content",
    ".content",
    ".entry-content",
    ".post-content",
    "#main",
];

const MIN_BLOCK_CHARS: usize = 10;
const MAX_BLOCK_CHARS: usize = 2000;
const MAX_BLOCKS: usize = 50;
const MAX_INTERNAL_LINKS: usize = 100;
const SAMPLE_CHARS: usize = 500;

/// Script sources and inline markers of common analytics tags
const ANALYTICS_MARKERS: &[(&str, &str)] = &[
    ("googletagmanager.com", "Google Tag Manager"),
    ("google-analytics.com", "Google Analytics"),
    ("gtag(", "Google Analytics"),
    ("connect.facebook.net", "Meta Pixel"),
    ("fbq(", "Meta Pixel"),
    ("plausible.io", "Plausible"),
    ("matomo", "Matomo"),
    ("static.hotjar.com", "Hotjar"),
];

/// Signals that feed the page checks but are not part of the stored record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSignals {
    /// Subresources loaded over plain http
    pub insecure_resources: usize,
    /// Names of the analytics tags found
    pub analytics_tags: Vec<String>,
}

/// Every field extracted from one document
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub meta_data: MetaData,
    pub social_tags: SocialTags,
    pub headings: Headings,
    pub images: ImageSummary,
    pub links: LinkSummary,
    pub structured_data: StructuredData,
    pub performance: Performance,
    pub content: ContentSummary,
    pub signals: PageSignals,
}

/// Parses a document and extracts all analysis fields
///
/// # Arguments
///
/// * `html` - The document body
/// * `page_url` - The page's own URL, used to resolve relative links
/// * `base_url` - The audited site, used to tell internal links from external ones
pub fn extract_page(html: &str, page_url: &Url, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);
    let links = extract_links(&document, page_url, base_url);

    ExtractedPage {
        meta_data: extract_meta(&document),
        social_tags: extract_social(&document),
        headings: extract_headings(&document),
        images: extract_images(&document),
        structured_data: extract_structured_data(&document),
        performance: extract_performance(&document, html.len()),
        content: extract_content(&document, &links),
        signals: PageSignals {
            insecure_resources: count_insecure_resources(&document),
            analytics_tags: detect_analytics(&document),
        },
        links,
    }
}

fn extract_meta(document: &Html) -> MetaData {
    let canonicals: Vec<String> = select_all(document, "link[rel][href]")
        .into_iter()
        .filter(|el| has_rel(el, "canonical"))
        .filter_map(|el| el.value().attr("href").map(|h| h.trim().to_string()))
        .collect();

    let charset = select_all(document, "meta[charset]")
        .first()
        .and_then(|el| el.value().attr("charset"))
        .map(|c| c.trim().to_string())
        .or_else(|| {
            select_all(document, "meta[http-equiv][content]")
                .into_iter()
                .filter_map(|el| el.value().attr("content"))
                .find_map(|content| {
                    let lower = content.to_lowercase();
                    lower
                        .split_once("charset=")
                        .map(|(_, cs)| cs.trim().to_string())
                })
        })
        .filter(|c| !c.is_empty());

    let lang = select_all(document, "html[lang]")
        .first()
        .and_then(|el| el.value().attr("lang"))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    MetaData {
        title: TextField::new(first_text(document, "title"), 30, 60),
        description: TextField::new(meta_content(document, "description"), 120, 160),
        keywords: meta_content(document, "keywords"),
        canonical: canonicals.first().cloned(),
        canonical_count: canonicals.len(),
        robots: meta_content(document, "robots"),
        viewport: meta_content(document, "viewport"),
        charset,
        lang,
    }
}

fn has_rel(element: &ElementRef<'_>, rel: &str) -> bool {
    element
        .value()
        .attr("rel")
        .map(|value| {
            value
                .split_whitespace()
                .any(|token| token.eq_ignore_ascii_case(rel))
        })
        .unwrap_or(false)
}

fn extract_social(document: &Html) -> SocialTags {
    let mut tags = SocialTags::default();

    for element in select_all(document, "meta[content]") {
        let value = element.value();
        let Some(content) = value.attr("content") else {
            continue;
        };
        let key = value.attr("property").or_else(|| value.attr("name"));
        let Some(key) = key.map(|k| k.trim().to_lowercase()) else {
            continue;
        };

        if let Some(name) = key.strip_prefix("og:") {
            tags.open_graph
                .entry(name.to_string())
                .or_insert_with(|| content.trim().to_string());
        } else if let Some(name) = key.strip_prefix("twitter:") {
            tags.twitter
                .entry(name.to_string())
                .or_insert_with(|| content.trim().to_string());
        }
    }

    tags
}

fn extract_headings(document: &Html) -> Headings {
    let structure: Vec<Heading> = select_all(document, "h1, h2, h3, h4, h5, h6")
        .iter()
        .filter_map(|el| {
            let level = el.value().name().strip_prefix('h')?.parse::<u8>().ok()?;
            Some(Heading {
                level,
                text: element_text(el),
            })
        })
        .collect();

    let h1s: Vec<&Heading> = structure.iter().filter(|h| h.level == 1).collect();

    Headings {
        h1_count: h1s.len(),
        h1_text: h1s
            .iter()
            .map(|h| h.text.clone())
            .filter(|t| !t.is_empty())
            .collect(),
        structure,
    }
}

fn extract_images(document: &Html) -> ImageSummary {
    let details: Vec<ImageDetail> = select_all(document, "img")
        .iter()
        .map(|el| {
            let value = el.value();
            let src = value
                .attr("src")
                .or_else(|| value.attr("data-src"))
                .unwrap_or_default()
                .trim()
                .to_string();
            let alt = value.attr("alt").map(|a| a.trim().to_string());
            let is_lazy = value
                .attr("loading")
                .map(|l| l.eq_ignore_ascii_case("lazy"))
                .unwrap_or(false)
                || value.attr("data-src").is_some()
                || value.classes().any(|c| c.contains("lazy"));

            ImageDetail {
                has_alt: alt.as_deref().map(|a| !a.is_empty()).unwrap_or(false),
                alt,
                src,
                is_lazy,
                has_dimensions: value.attr("width").is_some() && value.attr("height").is_some(),
            }
        })
        .collect();

    let with_alt = details.iter().filter(|d| d.has_alt).count();
    ImageSummary {
        total: details.len(),
        with_alt,
        without_alt: details.len() - with_alt,
        details,
    }
}

/// Returns true for hrefs that look like they lead nowhere useful
pub fn is_potentially_broken(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_lowercase();
    href == "#" || lower.contains("404") || lower.contains("error")
}

fn extract_links(document: &Html, page_url: &Url, base_url: &Url) -> LinkSummary {
    let mut summary = LinkSummary::default();

    for element in select_all(document, "a[href]") {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let text = element_text(&element);

        if is_potentially_broken(href) {
            summary.potentially_broken.push(LinkDetail {
                href: href.trim().to_string(),
                text: text.clone(),
            });
        }

        let Some(resolved) = resolve_link(href, page_url) else {
            continue;
        };
        let detail = LinkDetail {
            href: resolved.to_string(),
            text,
        };

        if same_host(&resolved, base_url) {
            summary.internal.push(detail);
        } else {
            summary.external.push(detail);
        }
    }

    summary
}

fn extract_structured_data(document: &Html) -> StructuredData {
    let mut data = StructuredData::default();

    for element in select_all(document, "script[type]") {
        let is_json_ld = element
            .value()
            .attr("type")
            .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
            .unwrap_or(false);
        if !is_json_ld {
            continue;
        }

        let body: String = element.text().collect();
        match serde_json::from_str::<serde_json::Value>(body.trim()) {
            Ok(value) => {
                collect_types(&value, &mut data.types);
                data.raw.push(value);
            }
            Err(_) => data.invalid_count += 1,
        }
    }

    data.count = data.raw.len();
    data
}

/// Collects `@type` values from a JSON-LD value, descending into arrays and `@graph`
fn collect_types(value: &serde_json::Value, types: &mut Vec<String>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                collect_types(item, types);
            }
        }
        serde_json::Value::Object(map) => {
            match map.get("@type") {
                Some(serde_json::Value::String(t)) => push_unique(types, t),
                Some(serde_json::Value::Array(ts)) => {
                    for t in ts.iter().filter_map(|t| t.as_str()) {
                        push_unique(types, t);
                    }
                }
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_types(graph, types);
            }
        }
        _ => {}
    }
}

fn push_unique(types: &mut Vec<String>, t: &str) {
    if !types.iter().any(|existing| existing == t) {
        types.push(t.to_string());
    }
}

fn extract_performance(document: &Html, html_size: usize) -> Performance {
    let stylesheets = select_all(document, "link[rel][href]")
        .iter()
        .filter(|el| has_rel(el, "stylesheet"))
        .count();

    Performance {
        resource_counts: ResourceCounts {
            stylesheets,
            scripts: select_all(document, "script[src]").len(),
            images: select_all(document, "img").len(),
            iframes: select_all(document, "iframe").len(),
        },
        html_size,
        measured: false,
    }
}

fn extract_content(document: &Html, links: &LinkSummary) -> ContentSummary {
    let mut blocks = primary_blocks(document);
    if blocks.is_empty() {
        blocks = fallback_blocks(document);
    }

    let sample_source = if blocks.is_empty() {
        collapse_whitespace(&visible_text(document))
    } else {
        blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut seen = HashSet::new();
    let internal_links = links
        .internal
        .iter()
        .filter(|link| {
            let key = normalize_url(&link.href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| link.href.clone());
            seen.insert(key)
        })
        .take(MAX_INTERNAL_LINKS)
        .map(|link| InternalLink {
            url: link.href.clone(),
            anchor_text: link.text.clone(),
        })
        .collect();

    ContentSummary {
        word_count: visible_text(document).split_whitespace().count(),
        blocks,
        internal_links,
        sample_text: sample_source.chars().take(SAMPLE_CHARS).collect(),
    }
}

/// Picks the candidate container with the most text
fn content_container(document: &Html) -> Option<ElementRef<'_>> {
    CONTENT_CONTAINERS
        .iter()
        .flat_map(|css| select_all(document, css))
        .max_by_key(|el| el.text().map(|t| t.trim().len()).sum::<usize>())
}

fn primary_blocks(document: &Html) -> Vec<ContentBlock> {
    let Some(container) = content_container(document) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6, p") else {
        return Vec::new();
    };

    container
        .select(&selector)
        .filter_map(|el| block(el.value().name(), element_text(&el)))
        .take(MAX_BLOCKS)
        .collect()
}

/// Uses only the direct text of generic containers so nested blocks are not repeated
fn fallback_blocks(document: &Html) -> Vec<ContentBlock> {
    select_all(document, "div, section, li")
        .iter()
        .filter_map(|el| {
            let direct: String = el
                .children()
                .filter_map(|child| child.value().as_text().map(|t| String::from(&**t)))
                .collect();
            block(el.value().name(), collapse_whitespace(&direct))
        })
        .take(MAX_BLOCKS)
        .collect()
}

fn block(tag: &str, text: String) -> Option<ContentBlock> {
    let len = text.chars().count();
    (MIN_BLOCK_CHARS..=MAX_BLOCK_CHARS)
        .contains(&len)
        .then(|| ContentBlock {
            tag: tag.to_string(),
            text,
        })
}

fn count_insecure_resources(document: &Html) -> usize {
    let src_insecure = select_all(
        document,
        "img[src], script[src], iframe[src], source[src], video[src], audio[src]",
    )
    .iter()
    .filter_map(|el| el.value().attr("src"))
    .filter(|src| src.trim().to_lowercase().starts_with("http://"))
    .count();

    let css_insecure = select_all(document, "link[rel][href]")
        .iter()
        .filter(|el| has_rel(el, "stylesheet"))
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| href.trim().to_lowercase().starts_with("http://"))
        .count();

    src_insecure + css_insecure
}

fn detect_analytics(document: &Html) -> Vec<String> {
    let mut found = Vec::new();

    for script in select_all(document, "script") {
        let haystack = match script.value().attr("src") {
            Some(src) => src.to_lowercase(),
            None => script.text().collect::<String>().to_lowercase(),
        };
        for (marker, name) in ANALYTICS_MARKERS {
            if haystack.contains(marker) {
                push_unique(&mut found, name);
            }
        }
    }

    found
}
