//! Breadth-first page discovery
//!
//! The frontier owns the pending queue and the visited set for one audit run.
//! Nothing else reads or writes them, so sitemap seeding and link harvesting
//! go through the same deduplicating `enqueue`.
//!
//! # Discovery Flow
//!
//! 1. Seed the base URL and its opposite-protocol variant
//! 2. Seed up to `sitemap_seed_limit` URLs from the site's sitemap
//! 3. Pop a batch, mark each URL visited, fetch the batch concurrently
//! 4. Record one `DiscoveredPage` per fetched URL and harvest its links
//! 5. Stop when the queue is empty, `max_pages` is reached, or the run is cancelled

use crate::config::AuditConfig;
use crate::crawler::fetcher::{FetchedPage, Fetcher};
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::crawler::sitemap::collect_sitemap_urls;
use crate::url::{flip_protocol, is_crawlable_link, normalize_url, same_host};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Issue recorded for a page that could not be fetched
pub const PAGE_LOAD_ERROR: &str = "Page Load Error";

/// A page found during discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPage {
    pub url: String,
    pub title: Option<String>,
    pub h1: Option<String>,
    pub meta_description: Option<String>,
    /// HTTP status, or 0 when the fetch failed
    pub status_code: u16,
    pub content_length: usize,
    pub content_type: String,
    pub word_count: usize,
    pub content_preview: String,
    pub robots_directive: Option<String>,
    pub is_indexable: bool,
    pub discovered_at: DateTime<Utc>,
    pub issues: Vec<String>,
}

impl DiscoveredPage {
    /// Builds a record from a fetched and parsed page
    pub fn from_fetch(url: &Url, fetched: &FetchedPage, parsed: &ParsedPage) -> Self {
        let robots_directive = parsed.robots.clone().or_else(|| fetched.x_robots_tag.clone());
        let noindex = robots_directive
            .as_deref()
            .map(|d| d.to_lowercase().contains("noindex"))
            .unwrap_or(false);

        let issues = if fetched.status_code >= 400 {
            vec![PAGE_LOAD_ERROR.to_string()]
        } else {
            classify_issues(parsed)
        };

        Self {
            url: url.to_string(),
            title: parsed.title.clone(),
            h1: parsed.h1.clone(),
            meta_description: parsed.meta_description.clone(),
            status_code: fetched.status_code,
            content_length: fetched.content_length(),
            content_type: fetched.content_type.clone(),
            word_count: parsed.word_count,
            content_preview: parsed.content_preview.clone(),
            robots_directive,
            is_indexable: !noindex && fetched.status_code < 400,
            discovered_at: Utc::now(),
            issues,
        }
    }

    /// Builds the degraded record for a page whose fetch failed
    pub fn load_error(url: &Url) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            h1: None,
            meta_description: None,
            status_code: 0,
            content_length: 0,
            content_type: String::new(),
            word_count: 0,
            content_preview: String::new(),
            robots_directive: None,
            is_indexable: false,
            discovered_at: Utc::now(),
            issues: vec![PAGE_LOAD_ERROR.to_string()],
        }
    }

    /// Builds a record from a page supplied by an external content source
    ///
    /// Nothing was fetched, so only the supplied fields are set.
    pub fn prefetched(url: &Url, title: Option<String>, word_count: usize) -> Self {
        Self {
            url: url.to_string(),
            title,
            h1: None,
            meta_description: None,
            status_code: 200,
            content_length: 0,
            content_type: "text/html".to_string(),
            word_count,
            content_preview: String::new(),
            robots_directive: None,
            is_indexable: true,
            discovered_at: Utc::now(),
            issues: Vec::new(),
        }
    }

    /// Returns true if the page was recorded with a load error
    pub fn is_load_error(&self) -> bool {
        self.issues.iter().any(|i| i == PAGE_LOAD_ERROR)
    }
}

/// Classifies the immediate issues visible at discovery time
pub fn classify_issues(parsed: &ParsedPage) -> Vec<String> {
    let mut issues = Vec::new();

    match &parsed.title {
        None => issues.push("Missing Title".to_string()),
        Some(title) => {
            let len = title.chars().count();
            if len < 30 {
                issues.push("Title Too Short".to_string());
            } else if len > 60 {
                issues.push("Title Too Long".to_string());
            }
        }
    }

    match &parsed.meta_description {
        None => issues.push("Missing Meta Description".to_string()),
        Some(desc) if desc.chars().count() < 120 => {
            issues.push("Meta Description Too Short".to_string())
        }
        Some(_) => {}
    }

    if parsed.h1.is_none() {
        issues.push("Missing H1".to_string());
    }

    if parsed.word_count < 300 {
        issues.push("Thin Content".to_string());
    }

    issues
}

/// Bounds applied to one discovery run
#[derive(Debug, Clone)]
pub struct FrontierLimits {
    /// Maximum pages recorded
    pub max_pages: usize,
    /// URLs fetched concurrently per batch
    pub batch_size: usize,
    /// Maximum URLs pending in the queue
    pub max_queue: usize,
    /// Maximum new links admitted from one page
    pub links_per_page: usize,
    /// Maximum URLs seeded from the sitemap
    pub sitemap_seed_limit: usize,
    /// Pause between batches
    pub batch_delay: Duration,
}

impl FrontierLimits {
    /// Builds limits from the audit configuration
    pub fn from_config(config: &AuditConfig, max_pages: usize, batch_delay: Duration) -> Self {
        Self {
            max_pages,
            batch_size: config.discovery_batch_size.max(1),
            max_queue: config.max_queue,
            links_per_page: config.links_per_page,
            sitemap_seed_limit: config.sitemap_seed_limit,
            batch_delay,
        }
    }
}

/// Breadth-first URL frontier for a single audit run
pub struct Frontier {
    fetcher: Arc<Fetcher>,
    base_url: Url,
    limits: FrontierLimits,
    declared_sitemaps: Vec<String>,
    cancel: CancellationToken,

    /// URLs waiting to be fetched
    queue: VecDeque<Url>,
    /// Keys of every URL ever enqueued
    enqueued: HashSet<String>,
    /// Keys of every URL fetched, including redirect targets
    visited: HashSet<String>,

    discovered: usize,
    batches: usize,
    seeded: bool,
}

impl Frontier {
    /// Creates a frontier rooted at `base_url`
    pub fn new(
        fetcher: Arc<Fetcher>,
        base_url: Url,
        limits: FrontierLimits,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            base_url,
            limits,
            declared_sitemaps: Vec::new(),
            cancel,
            queue: VecDeque::new(),
            enqueued: HashSet::new(),
            visited: HashSet::new(),
            discovered: 0,
            batches: 0,
            seeded: false,
        }
    }

    /// Sets the sitemaps declared in robots.txt, tried after the well-known locations
    pub fn with_declared_sitemaps(mut self, sitemaps: Vec<String>) -> Self {
        self.declared_sitemaps = sitemaps;
        self
    }

    /// Number of pages recorded so far
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    /// Number of URLs waiting in the queue
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if the URL has been fetched during this run
    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&url_key(url))
    }

    /// Adds a URL to the queue
    ///
    /// Returns false if the URL was already enqueued or visited, or the queue
    /// is full.
    pub fn enqueue(&mut self, url: &Url) -> bool {
        let Ok(normalized) = normalize_url(url.as_str()) else {
            return false;
        };
        let key = normalized.to_string();

        if self.visited.contains(&key) || self.enqueued.contains(&key) {
            return false;
        }
        if self.queue.len() >= self.limits.max_queue {
            return false;
        }

        self.enqueued.insert(key);
        self.queue.push_back(normalized);
        true
    }

    /// Seeds the queue from the base URL, its protocol variant and the sitemap
    async fn seed(&mut self) {
        self.seeded = true;

        let base = self.base_url.clone();
        self.enqueue(&base);
        if let Some(variant) = flip_protocol(&base) {
            self.enqueue(&variant);
        }

        let sitemap_urls = tokio::select! {
            _ = self.cancel.cancelled() => return,
            urls = collect_sitemap_urls(
                &self.fetcher,
                &base,
                &self.declared_sitemaps,
                self.limits.sitemap_seed_limit,
            ) => urls,
        };

        let mut seeded = 0;
        for url in &sitemap_urls {
            if self.enqueue(url) {
                seeded += 1;
            }
        }
        debug!(seeded, pending = self.queue.len(), "Frontier seeded");
    }

    /// Fetches the next batch and returns the pages it produced
    ///
    /// # Returns
    ///
    /// * `Some(pages)` - A batch was processed (it may have produced no records)
    /// * `None` - Discovery is finished or was cancelled
    pub async fn next_batch(&mut self) -> Option<Vec<DiscoveredPage>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if !self.seeded {
            self.seed().await;
        } else if !self.limits.batch_delay.is_zero() {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.limits.batch_delay) => {}
            }
        }

        let remaining = self.limits.max_pages.saturating_sub(self.discovered);
        if remaining == 0 {
            return None;
        }

        let mut batch = Vec::new();
        while batch.len() < self.limits.batch_size.min(remaining) {
            let Some(url) = self.queue.pop_front() else {
                break;
            };
            if !self.visited.insert(url_key(&url)) {
                continue;
            }
            batch.push(url);
        }

        if batch.is_empty() {
            return None;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let timeout = fetcher.discovery_timeout();
        let fetches = join_all(batch.iter().map(|url| fetcher.fetch(url.as_str(), timeout)));
        let results = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            results = fetches => results,
        };

        let mut pages = Vec::with_capacity(batch.len());
        for (url, result) in batch.iter().zip(results) {
            let page = match result {
                Ok(fetched) => self.process_fetched(url, &fetched),
                Err(e) => {
                    warn!(url = %url, error = %e, "Discovery fetch failed");
                    Some(DiscoveredPage::load_error(url))
                }
            };
            if let Some(page) = page {
                pages.push(page);
            }
        }

        self.batches += 1;
        self.discovered += pages.len();
        debug!(
            batch = self.batches,
            recorded = pages.len(),
            discovered = self.discovered,
            pending = self.queue.len(),
            "Discovery batch complete"
        );

        Some(pages)
    }

    /// Turns one successful fetch into a record and harvests its links
    ///
    /// Returns None when the response is not a page of this site or was
    /// already recorded under its redirect target.
    fn process_fetched(&mut self, requested: &Url, fetched: &FetchedPage) -> Option<DiscoveredPage> {
        let final_url = normalize_url(&fetched.final_url).unwrap_or_else(|_| requested.clone());

        if !same_host(&final_url, &self.base_url) {
            debug!(url = %requested, target = %final_url, "Redirected off-host, skipping");
            return None;
        }

        let final_key = url_key(&final_url);
        if final_key != url_key(requested) && !self.visited.insert(final_key) {
            debug!(url = %requested, target = %final_url, "Redirect target already visited");
            return None;
        }

        if !fetched.is_html() {
            debug!(url = %final_url, content_type = %fetched.content_type, "Not an HTML page");
            return None;
        }

        let parsed = parse_html(&fetched.body, &final_url);
        if fetched.status_code < 400 {
            self.harvest_links(&parsed.links);
        }

        Some(DiscoveredPage::from_fetch(&final_url, fetched, &parsed))
    }

    fn harvest_links(&mut self, links: &[Url]) {
        let mut admitted = 0;
        for link in links {
            if admitted >= self.limits.links_per_page || self.queue.len() >= self.limits.max_queue {
                break;
            }
            if !is_crawlable_link(link, &self.base_url) {
                continue;
            }
            if self.enqueue(link) {
                admitted += 1;
            }
        }
    }

    /// Runs discovery to completion and returns every recorded page
    pub async fn run(mut self) -> Vec<DiscoveredPage> {
        let mut pages = Vec::new();
        while let Some(batch) = self.next_batch().await {
            pages.extend(batch);
        }
        info!(
            base_url = %self.base_url,
            discovered = pages.len(),
            "Discovery complete"
        );
        pages
    }
}

fn url_key(url: &Url) -> String {
    normalize_url(url.as_str())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;

    fn parsed(title: Option<&str>, desc: Option<&str>, h1: Option<&str>, words: usize) -> ParsedPage {
        ParsedPage {
            title: title.map(String::from),
            h1: h1.map(String::from),
            meta_description: desc.map(String::from),
            word_count: words,
            ..Default::default()
        }
    }

    fn test_frontier(max_queue: usize) -> Frontier {
        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let limits = FrontierLimits {
            max_pages: 10,
            batch_size: 15,
            max_queue,
            links_per_page: 50,
            sitemap_seed_limit: 150,
            batch_delay: Duration::ZERO,
        };
        Frontier::new(
            Arc::new(fetcher),
            Url::parse("https://example.com/").unwrap(),
            limits,
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_classify_all_missing() {
        let issues = classify_issues(&parsed(None, None, None, 10));
        assert_eq!(
            issues,
            vec![
                "Missing Title",
                "Missing Meta Description",
                "Missing H1",
                "Thin Content"
            ]
        );
    }

    #[test]
    fn test_classify_length_bands() {
        let long_title = "x".repeat(61);
        let issues = classify_issues(&parsed(Some(&long_title), Some("short"), Some("H"), 400));
        assert_eq!(issues, vec!["Title Too Long", "Meta Description Too Short"]);

        let issues = classify_issues(&parsed(Some("tiny"), Some(&"d".repeat(130)), Some("H"), 400));
        assert_eq!(issues, vec!["Title Too Short"]);
    }

    #[test]
    fn test_classify_clean_page() {
        let title = "A perfectly reasonable page title here";
        let issues = classify_issues(&parsed(Some(title), Some(&"d".repeat(130)), Some("H"), 300));
        assert!(issues.is_empty());
    }

    #[test]
    fn test_load_error_record() {
        let page = DiscoveredPage::load_error(&Url::parse("https://example.com/x").unwrap());
        assert_eq!(page.status_code, 0);
        assert_eq!(page.issues, vec![PAGE_LOAD_ERROR]);
        assert!(page.is_load_error());
        assert!(!page.is_indexable);
    }

    #[test]
    fn test_enqueue_dedupes_normalized_urls() {
        let mut frontier = test_frontier(200);
        assert!(frontier.enqueue(&Url::parse("https://example.com/a").unwrap()));
        assert!(!frontier.enqueue(&Url::parse("https://EXAMPLE.com/a/").unwrap()));
        assert!(!frontier.enqueue(&Url::parse("https://example.com/a#top").unwrap()));
        assert!(!frontier.enqueue(&Url::parse("https://example.com/a?utm_source=x").unwrap()));
        assert_eq!(frontier.pending(), 1);
    }

    #[test]
    fn test_enqueue_respects_queue_cap() {
        let mut frontier = test_frontier(2);
        assert!(frontier.enqueue(&Url::parse("https://example.com/1").unwrap()));
        assert!(frontier.enqueue(&Url::parse("https://example.com/2").unwrap()));
        assert!(!frontier.enqueue(&Url::parse("https://example.com/3").unwrap()));
    }

    #[test]
    fn test_protocol_variants_are_distinct_keys() {
        let mut frontier = test_frontier(200);
        assert!(frontier.enqueue(&Url::parse("https://example.com/").unwrap()));
        assert!(frontier.enqueue(&Url::parse("http://example.com/").unwrap()));
    }

    #[tokio::test]
    async fn test_cancelled_frontier_yields_nothing() {
        let mut frontier = test_frontier(200);
        frontier.cancel.cancel();
        assert!(frontier.next_batch().await.is_none());
    }
    #[tokio::test]
    async fn test_first_batch_marks_seeds_visited_and_queues_links() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><head><title>Home</title></head><body><a href=\"/a\">A</a></body></html>",
                "text/html",
            ))
            .mount(&server)
            .await;

        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        let mut frontier = test_frontier(200);
        frontier.base_url = base.clone();

        let pages = frontier.next_batch().await.unwrap();
        assert!(pages.iter().any(|p| p.title.as_deref() == Some("Home")));
        assert!(frontier.is_visited(&base));

        let linked = base.join("/a").unwrap();
        assert!(!frontier.is_visited(&linked));
        assert_eq!(frontier.pending(), 1);
        assert!(!frontier.enqueue(&linked));
    }
}
