//! Robots.txt parser implementation
//!
//! This module provides functionality for parsing robots.txt content using the robotstxt crate.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
///
/// This is a wrapper around the robotstxt crate's types, providing a simplified
/// interface for checking if URLs are allowed and which sitemaps are declared.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used as the default when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to check
    /// * `user_agent` - The user agent string
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Returns the URLs of all `Sitemap:` directives, in file order
    ///
    /// Sitemap directives are global; they do not belong to a user-agent group.
    pub fn sitemaps(&self) -> Vec<String> {
        self.content
            .lines()
            .filter_map(|line| {
                let trimmed = line.trim();
                let (key, value) = trimmed.split_once(':')?;
                if key.trim().eq_ignore_ascii_case("sitemap") {
                    let value = value.trim();
                    (!value.is_empty()).then(|| value.to_string())
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("https://example.com/anything", "TestBot"));
        assert!(robots.sitemaps().is_empty());
    }

    #[test]
    fn test_disallow_path() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /private/\n");
        assert!(!robots.is_allowed("https://example.com/private/page", "TestBot"));
        assert!(robots.is_allowed("https://example.com/public", "TestBot"));
    }

    #[test]
    fn test_disallow_everything() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /\n");
        assert!(!robots.is_allowed("https://example.com/", "*"));
    }

    #[test]
    fn test_specific_agent_rules() {
        let robots = ParsedRobots::from_content(
            "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /\n",
        );
        assert!(!robots.is_allowed("https://example.com/page", "BadBot"));
        assert!(robots.is_allowed("https://example.com/page", "GoodBot"));
    }

    #[test]
    fn test_declared_sitemaps() {
        let robots = ParsedRobots::from_content(
            "User-agent: *\nDisallow:\nSitemap: https://example.com/post-sitemap.xml\n# comment\nsitemap:   https://example.com/page-sitemap.xml  \nSitemap:\n",
        );
        assert_eq!(
            robots.sitemaps(),
            vec![
                "https://example.com/post-sitemap.xml",
                "https://example.com/page-sitemap.xml"
            ]
        );
    }
}
