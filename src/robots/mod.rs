//! Robots.txt handling module
//!
//! This module fetches and parses robots.txt for the audited site. The audit
//! records whether the file exists and what it allows; the frontier reads its
//! `Sitemap:` lines when the well-known sitemap locations are missing.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use crate::url::site_root;
use tracing::debug;
use url::Url;

/// Fetches robots.txt for the site a URL belongs to
///
/// # Arguments
///
/// * `fetcher` - The fetcher to issue the request with
/// * `base_url` - Any URL on the site
///
/// # Returns
///
/// * `Some(ParsedRobots)` - robots.txt exists and was read
/// * `None` - robots.txt is missing or could not be fetched
pub async fn fetch_robots(fetcher: &Fetcher, base_url: &Url) -> Option<ParsedRobots> {
    let robots_url = site_root(base_url).join("robots.txt").ok()?;

    match fetcher
        .fetch_text(robots_url.as_str(), fetcher.discovery_timeout())
        .await
    {
        Ok(body) => Some(ParsedRobots::from_content(&body)),
        Err(e) => {
            debug!(url = %robots_url, error = %e, "robots.txt unavailable");
            None
        }
    }
}

/// Checks if a URL is allowed by robots.txt
pub fn is_allowed(robots: &ParsedRobots, url: &str, user_agent: &str) -> bool {
    robots.is_allowed(url, user_agent)
}
