//! Site-wide checks
//!
//! robots.txt, sitemap, SSL, structured-data coverage and, for deep audits,
//! a broken-link sweep over the internal links found during analysis.

use super::types::{
    AuditIssue, BrokenLink, RobotsCheck, SchemaCoverage, Severity, SiteChecks, SitemapCheck,
    SslCheck,
};
use crate::analyzer::PageAnalysis;
use crate::crawler::{sitemap, Fetcher};
use crate::robots::ParsedRobots;
use crate::url::{flip_protocol, normalize_url, site_root};
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Maximum internal links probed by the broken-link sweep
pub const BROKEN_LINK_LIMIT: usize = 50;

/// Links probed concurrently by the broken-link sweep
const PROBE_CHUNK: usize = 10;

/// Product token used when evaluating robots.txt rules
const ROBOTS_AGENT: &str = "seo-sweep";

/// Runs every site-wide check
///
/// # Arguments
///
/// * `robots` - The site's robots.txt, or None when it is missing
/// * `analyses` - Every page analysis of the run
/// * `deep` - Whether the broken-link sweep runs
pub async fn run_site_checks(
    fetcher: &Fetcher,
    base_url: &Url,
    robots: Option<&ParsedRobots>,
    analyses: &[PageAnalysis],
    deep: bool,
    cancel: &CancellationToken,
) -> SiteChecks {
    let robots_check = robots_check(base_url, robots);
    let sitemap_check = sitemap_check(fetcher, base_url, &robots_check.sitemaps).await;
    let ssl = ssl_check(fetcher, base_url).await;
    let schema = schema_coverage(analyses);
    let broken_links = if deep {
        broken_link_sweep(fetcher, analyses, cancel).await
    } else {
        Vec::new()
    };

    let mut checks = SiteChecks {
        broken_links,
        robots: robots_check,
        sitemap: sitemap_check,
        ssl,
        schema,
        issues: Vec::new(),
    };
    checks.issues = site_issues(&checks);

    info!(
        broken_links = checks.broken_links.len(),
        issues = checks.issues.len(),
        "Site checks complete"
    );
    checks
}

/// Summarizes robots.txt
pub fn robots_check(base_url: &Url, robots: Option<&ParsedRobots>) -> RobotsCheck {
    match robots {
        Some(robots) => RobotsCheck {
            present: true,
            allows_root: robots.is_allowed(site_root(base_url).as_str(), ROBOTS_AGENT),
            sitemaps: robots.sitemaps(),
        },
        None => RobotsCheck {
            present: false,
            allows_root: true,
            sitemaps: Vec::new(),
        },
    }
}

async fn sitemap_check(fetcher: &Fetcher, base_url: &Url, declared: &[String]) -> SitemapCheck {
    match sitemap::locate_sitemap(fetcher, base_url, declared).await {
        Some((location, _)) => SitemapCheck {
            present: true,
            location: Some(location),
        },
        None => SitemapCheck::default(),
    }
}

/// Checks the scheme of the site and, for https sites, whether http redirects to it
async fn ssl_check(fetcher: &Fetcher, base_url: &Url) -> SslCheck {
    let https = base_url.scheme() == "https";
    if !https {
        return SslCheck {
            https,
            http_redirects_to_https: None,
        };
    }

    let Some(http_root) = flip_protocol(&site_root(base_url)) else {
        return SslCheck {
            https,
            http_redirects_to_https: None,
        };
    };

    let redirects = match fetcher
        .probe_redirect(http_root.as_str(), fetcher.discovery_timeout())
        .await
    {
        Ok(Some(location)) => Some(location.starts_with("https://")),
        Ok(None) => Some(false),
        Err(e) => {
            debug!(url = %http_root, error = %e, "http variant unreachable");
            None
        }
    };

    SslCheck {
        https,
        http_redirects_to_https: redirects,
    }
}

/// Counts structured-data usage across non-degraded analyses
pub fn schema_coverage(analyses: &[PageAnalysis]) -> SchemaCoverage {
    let analyzed: Vec<&PageAnalysis> = analyses.iter().filter(|a| !a.is_degraded()).collect();
    let types: BTreeSet<String> = analyzed
        .iter()
        .flat_map(|a| a.structured_data.types.iter().cloned())
        .collect();

    SchemaCoverage {
        pages_analyzed: analyzed.len(),
        pages_with_schema: analyzed
            .iter()
            .filter(|a| a.structured_data.count > 0)
            .count(),
        invalid_blocks: analyzed.iter().map(|a| a.structured_data.invalid_count).sum(),
        types: types.into_iter().collect(),
    }
}

/// Unique internal links of the analyses, each with the first page linking to it
///
/// Pages that were analyzed themselves are not probed again.
pub fn sweep_candidates(analyses: &[PageAnalysis], limit: usize) -> Vec<(String, String)> {
    let analyzed: BTreeSet<String> = analyses
        .iter()
        .filter_map(|a| normalize_url(&a.url).ok())
        .map(|u| u.to_string())
        .collect();

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for analysis in analyses.iter().filter(|a| !a.is_degraded()) {
        for link in &analysis.links.internal {
            if candidates.len() >= limit {
                return candidates;
            }
            let Ok(normalized) = normalize_url(&link.href) else {
                continue;
            };
            let key = normalized.to_string();
            if analyzed.contains(&key) || !seen.insert(key.clone()) {
                continue;
            }
            candidates.push((key, analysis.url.clone()));
        }
    }
    candidates
}

async fn broken_link_sweep(
    fetcher: &Fetcher,
    analyses: &[PageAnalysis],
    cancel: &CancellationToken,
) -> Vec<BrokenLink> {
    let candidates = sweep_candidates(analyses, BROKEN_LINK_LIMIT);
    debug!(links = candidates.len(), "Sweeping internal links");

    let mut broken = Vec::new();
    for chunk in candidates.chunks(PROBE_CHUNK) {
        if cancel.is_cancelled() {
            break;
        }
        let probes = chunk.iter().map(|(url, found_on)| async move {
            let outcome = fetcher.probe_status(url, fetcher.discovery_timeout()).await;
            match outcome {
                Ok(status) if status < 400 => None,
                Ok(status) => Some(BrokenLink {
                    url: url.clone(),
                    status: Some(status),
                    error: None,
                    found_on: found_on.clone(),
                }),
                Err(e) => Some(BrokenLink {
                    url: url.clone(),
                    status: None,
                    error: Some(e.to_string()),
                    found_on: found_on.clone(),
                }),
            }
        });
        broken.extend(join_all(probes).await.into_iter().flatten());
    }
    broken
}

/// Site-level deficiencies of a set of checks
pub fn site_issues(checks: &SiteChecks) -> Vec<AuditIssue> {
    let mut issues = Vec::new();

    if !checks.robots.present {
        issues.push(AuditIssue::new("missing_robots", Severity::Low, "No robots.txt found"));
    } else if !checks.robots.allows_root {
        issues.push(AuditIssue::new(
            "robots_blocks_site",
            Severity::Critical,
            "robots.txt disallows crawling the site root",
        ));
    }

    if !checks.sitemap.present {
        issues.push(AuditIssue::new("missing_sitemap", Severity::Medium, "No XML sitemap found"));
    }

    if !checks.ssl.https {
        issues.push(AuditIssue::new("no_https", Severity::Critical, "Site is not served over HTTPS"));
    } else if checks.ssl.http_redirects_to_https == Some(false) {
        issues.push(AuditIssue::new(
            "http_not_redirected",
            Severity::Medium,
            "The http variant does not redirect to https",
        ));
    }

    let schema = &checks.schema;
    if schema.pages_analyzed > 0 && schema.pages_with_schema == 0 {
        issues.push(AuditIssue::new(
            "no_structured_data",
            Severity::Medium,
            "No page declares JSON-LD structured data",
        ));
    }
    if schema.invalid_blocks > 0 {
        issues.push(AuditIssue::new(
            "invalid_structured_data",
            Severity::Low,
            format!("{} JSON-LD blocks could not be parsed", schema.invalid_blocks),
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::LinkDetail;
    use crate::config::FetcherConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(url: &str, links: &[&str]) -> PageAnalysis {
        let mut analysis = PageAnalysis::degraded(url, 200, "");
        analysis.error = None;
        analysis.links.internal = links
            .iter()
            .map(|href| LinkDetail {
                href: href.to_string(),
                text: String::new(),
            })
            .collect();
        analysis
    }

    #[test]
    fn test_robots_check() {
        let base = Url::parse("https://example.com/").unwrap();
        let robots = ParsedRobots::from_content(
            "User-agent: *\nDisallow: /\nSitemap: https://example.com/map.xml\n",
        );
        let check = robots_check(&base, Some(&robots));
        assert!(check.present);
        assert!(!check.allows_root);
        assert_eq!(check.sitemaps, vec!["https://example.com/map.xml"]);

        let missing = robots_check(&base, None);
        assert!(!missing.present);
        assert!(missing.allows_root);
    }

    #[test]
    fn test_schema_coverage() {
        let mut with_schema = page("https://example.com/", &[]);
        with_schema.structured_data.count = 1;
        with_schema.structured_data.types = vec!["Organization".into()];
        let mut invalid = page("https://example.com/b", &[]);
        invalid.structured_data.invalid_count = 2;
        let degraded = PageAnalysis::degraded("https://example.com/c", 0, "down");

        let coverage = schema_coverage(&[with_schema, invalid, degraded]);
        assert_eq!(coverage.pages_analyzed, 2);
        assert_eq!(coverage.pages_with_schema, 1);
        assert_eq!(coverage.invalid_blocks, 2);
        assert_eq!(coverage.types, vec!["Organization"]);
    }

    #[test]
    fn test_sweep_candidates_unique_and_capped() {
        let analyses = vec![
            page(
                "https://example.com/",
                &[
                    "https://example.com/a",
                    "https://example.com/a#top",
                    "https://example.com/b",
                    "https://example.com/",
                ],
            ),
            page("https://example.com/b", &["https://example.com/c"]),
        ];
        let candidates = sweep_candidates(&analyses, 50);
        let urls: Vec<&str> = candidates.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/c"]);
        assert_eq!(candidates[1].1, "https://example.com/b");

        assert_eq!(sweep_candidates(&analyses, 1).len(), 1);
    }

    #[test]
    fn test_site_issues() {
        let checks = SiteChecks {
            ssl: SslCheck {
                https: true,
                http_redirects_to_https: Some(false),
            },
            schema: SchemaCoverage {
                pages_analyzed: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let kinds: Vec<String> = site_issues(&checks).into_iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                "missing_robots",
                "missing_sitemap",
                "http_not_redirected",
                "no_structured_data"
            ]
        );
    }

    #[tokio::test]
    async fn test_broken_link_sweep_only_when_deep() {
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

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let analyses = vec![page(
            &format!("{}/", server.uri()),
            &[&format!("{}/ok", server.uri()), &format!("{}/gone", server.uri())],
        )];
        let cancel = CancellationToken::new();

        let deep = run_site_checks(&fetcher, &base, None, &analyses, true, &cancel).await;
        assert_eq!(deep.broken_links.len(), 1);
        assert!(deep.broken_links[0].url.ends_with("/gone"));
        assert_eq!(deep.broken_links[0].status, Some(404));
        assert!(!deep.ssl.https);
        assert!(deep.issues.iter().any(|i| i.kind == "no_https"));

        let shallow = run_site_checks(&fetcher, &base, None, &analyses, false, &cancel).await;
        assert!(shallow.broken_links.is_empty());
    }

    #[tokio::test]
    async fn test_sitemap_presence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<urlset></urlset>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&FetcherConfig::default()).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let checks =
            run_site_checks(&fetcher, &base, None, &[], false, &CancellationToken::new()).await;
        assert!(checks.sitemap.present);
        assert!(checks.sitemap.location.unwrap().ends_with("/sitemap.xml"));
    }
}
