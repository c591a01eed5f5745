//! Binary page checks
//!
//! Checks are independent of the rule set and meant for machine
//! consumption. Link-liveness and redirect checks need extra requests, so
//! they only run when deep analysis is enabled; otherwise they report
//! `Unknown`.

use super::extract::ExtractedPage;
use super::types::{Check, CheckStatus};
use crate::crawler::Fetcher;
use crate::url::normalize_url;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Internal links probed per page by the broken-link check
pub const LINK_SAMPLE_SIZE: usize = 5;

pub const CHECK_HTTPS: &str = "https";
pub const CHECK_MIXED_CONTENT: &str = "mixed-content";
pub const CHECK_MOBILE_VIEWPORT: &str = "mobile-viewport";
pub const CHECK_REDIRECT: &str = "redirect";
pub const CHECK_BROKEN_LINKS: &str = "broken-links";
pub const CHECK_SCHEMA_PRESENT: &str = "schema-present";
pub const CHECK_SCHEMA_VALID: &str = "schema-valid";
pub const CHECK_ANALYTICS: &str = "analytics";

fn check(
    id: &str,
    category: &str,
    label: &str,
    status: CheckStatus,
    recommendation: Option<&str>,
) -> Check {
    Check {
        id: id.to_string(),
        category: category.to_string(),
        label: label.to_string(),
        // Recommendations only accompany failures
        recommendation: match status {
            CheckStatus::Fail => recommendation.map(String::from),
            _ => None,
        },
        status,
    }
}

fn pass_fail(ok: bool) -> CheckStatus {
    if ok {
        CheckStatus::Pass
    } else {
        CheckStatus::Fail
    }
}

/// Evaluates the checks that need nothing beyond the document
pub fn static_checks(page_url: &Url, page: &ExtractedPage) -> Vec<Check> {
    let is_https = page_url.scheme() == "https";

    let mixed = if is_https {
        pass_fail(page.signals.insecure_resources == 0)
    } else {
        CheckStatus::Unknown
    };

    let mobile = page
        .meta_data
        .viewport
        .as_deref()
        .map(|v| v.to_lowercase().replace(' ', "").contains("width=device-width"))
        .unwrap_or(false);

    let schema_valid = if page.structured_data.count == 0 && page.structured_data.invalid_count == 0 {
        CheckStatus::Unknown
    } else {
        pass_fail(page.structured_data.invalid_count == 0)
    };

    vec![
        check(
            CHECK_HTTPS,
            "security",
            "Page is served over HTTPS",
            pass_fail(is_https),
            Some("Serve every page over HTTPS"),
        ),
        check(
            CHECK_MIXED_CONTENT,
            "security",
            "No insecure subresources",
            mixed,
            Some("Load images, scripts and stylesheets over HTTPS"),
        ),
        check(
            CHECK_MOBILE_VIEWPORT,
            "mobile",
            "Viewport is set for mobile devices",
            pass_fail(mobile),
            Some("Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">"),
        ),
        check(
            CHECK_SCHEMA_PRESENT,
            "schema",
            "Structured data present",
            pass_fail(page.structured_data.count > 0),
            Some("Describe the page with JSON-LD structured data"),
        ),
        check(
            CHECK_SCHEMA_VALID,
            "schema",
            "Structured data parses as JSON",
            schema_valid,
            Some("Fix the malformed JSON-LD blocks"),
        ),
        check(
            CHECK_ANALYTICS,
            "analytics",
            "Analytics tag installed",
            pass_fail(!page.signals.analytics_tags.is_empty()),
            Some("Install an analytics tag to measure traffic"),
        ),
    ]
}

/// Evaluates the checks that issue requests
///
/// With `deep` false both checks report `Unknown` and nothing is fetched.
pub async fn network_checks(
    fetcher: &Fetcher,
    page_url: &Url,
    page: &ExtractedPage,
    deep: bool,
) -> Vec<Check> {
    let (redirect, broken) = if deep {
        (
            redirect_status(fetcher, page_url).await,
            broken_link_status(fetcher, page).await,
        )
    } else {
        (CheckStatus::Unknown, CheckStatus::Unknown)
    };

    vec![
        check(
            CHECK_REDIRECT,
            "technical",
            "Page answers without redirecting",
            redirect,
            Some("Link directly to the final URL instead of a redirect"),
        ),
        check(
            CHECK_BROKEN_LINKS,
            "links",
            "Sampled internal links resolve",
            broken,
            Some("Fix or remove internal links that return errors"),
        ),
    ]
}

async fn redirect_status(fetcher: &Fetcher, page_url: &Url) -> CheckStatus {
    match fetcher
        .probe_redirect(page_url.as_str(), fetcher.analysis_timeout())
        .await
    {
        Ok(Some(location)) => {
            debug!(url = %page_url, location = %location, "Page redirects");
            CheckStatus::Fail
        }
        Ok(None) => CheckStatus::Pass,
        Err(e) => {
            debug!(url = %page_url, error = %e, "Redirect probe failed");
            CheckStatus::Unknown
        }
    }
}

async fn broken_link_status(fetcher: &Fetcher, page: &ExtractedPage) -> CheckStatus {
    let mut seen = HashSet::new();
    let sample: Vec<&str> = page
        .links
        .internal
        .iter()
        .map(|link| link.href.as_str())
        .filter(|href| {
            let key = normalize_url(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string());
            seen.insert(key)
        })
        .take(LINK_SAMPLE_SIZE)
        .collect();

    if sample.is_empty() {
        return CheckStatus::Unknown;
    }

    let probes = sample
        .iter()
        .map(|href| fetcher.probe_status(href, fetcher.discovery_timeout()));
    let results = futures::future::join_all(probes).await;

    let broken = results
        .iter()
        .filter(|r| !matches!(r, Ok(status) if *status < 400))
        .count();
    pass_fail(broken == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::extract::extract_page;
    use crate::config::FetcherConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn status_of(checks: &[Check], id: &str) -> CheckStatus {
        checks.iter().find(|c| c.id == id).unwrap().status
    }

    #[test]
    fn test_static_checks_secure_page() {
        let url = Url::parse("https://example.com/").unwrap();
        let page = extract_page(
            r#"<html><head>
                <meta name="viewport" content="width=device-width, initial-scale=1">
                <script type="application/ld+json">{"@type":"WebSite"}</script>
                <script src="https://www.googletagmanager.com/gtag/js?id=G-1"></script>
            </head><body><img src="https://example.com/a.png"></body></html>"#,
            &url,
            &url,
        );
        let checks = static_checks(&url, &page);

        assert_eq!(status_of(&checks, CHECK_HTTPS), CheckStatus::Pass);
        assert_eq!(status_of(&checks, CHECK_MIXED_CONTENT), CheckStatus::Pass);
        assert_eq!(status_of(&checks, CHECK_MOBILE_VIEWPORT), CheckStatus::Pass);
        assert_eq!(status_of(&checks, CHECK_SCHEMA_PRESENT), CheckStatus::Pass);
        assert_eq!(status_of(&checks, CHECK_SCHEMA_VALID), CheckStatus::Pass);
        assert_eq!(status_of(&checks, CHECK_ANALYTICS), CheckStatus::Pass);
        assert!(checks.iter().all(|c| c.recommendation.is_none()));
    }

    #[test]
    fn test_static_checks_insecure_page() {
        let url = Url::parse("http://example.com/").unwrap();
        let page = extract_page(
            r#"<html><head><script type="application/ld+json">{broken</script></head></html>"#,
            &url,
            &url,
        );
        let checks = static_checks(&url, &page);

        assert_eq!(status_of(&checks, CHECK_HTTPS), CheckStatus::Fail);
        assert_eq!(status_of(&checks, CHECK_MIXED_CONTENT), CheckStatus::Unknown);
        assert_eq!(status_of(&checks, CHECK_MOBILE_VIEWPORT), CheckStatus::Fail);
        assert_eq!(status_of(&checks, CHECK_SCHEMA_PRESENT), CheckStatus::Fail);
        assert_eq!(status_of(&checks, CHECK_SCHEMA_VALID), CheckStatus::Fail);

        let https = checks.iter().find(|c| c.id == CHECK_HTTPS).unwrap();
        assert!(https.recommendation.is_some());
    }

    #[test]
    fn test_mixed_content_detected() {
        let url = Url::parse("https://example.com/").unwrap();
        let page = extract_page(
            r#"<body><img src="http://example.com/a.png"></body>"#,
            &url,
            &url,
        );
        let checks = static_checks(&url, &page);
        assert_eq!(status_of(&checks, CHECK_MIXED_CONTENT), CheckStatus::Fail);
    }

    #[tokio::test]
    async fn test_network_checks_skipped_without_deep() {
        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let url = Url::parse("https://example.invalid/").unwrap();
        let page = extract_page("<a href=\"/x\">x</a>", &url, &url);

        let checks = network_checks(&fetcher, &url, &page, false).await;
        assert_eq!(status_of(&checks, CHECK_REDIRECT), CheckStatus::Unknown);
        assert_eq!(status_of(&checks, CHECK_BROKEN_LINKS), CheckStatus::Unknown);
    }

    #[tokio::test]
    async fn test_network_checks_find_broken_link() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        let page = extract_page(
            r#"<a href="/ok">ok</a><a href="/gone">gone</a>"#,
            &url,
            &url,
        );

        let checks = network_checks(&fetcher, &url, &page, true).await;
        assert_eq!(status_of(&checks, CHECK_REDIRECT), CheckStatus::Pass);
        assert_eq!(status_of(&checks, CHECK_BROKEN_LINKS), CheckStatus::Fail);
    }
}
