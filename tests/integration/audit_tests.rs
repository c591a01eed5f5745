//! Integration tests for the audit pipeline
//!
//! These tests use wiremock to serve a small site and run discovery,
//! analysis, site checks and scoring against it.

use seo_sweep::audit::{AuditPipeline, AuditRequest, MemoryTier, TierPolicy};
use seo_sweep::config::Config;
use seo_sweep::crawler::PAGE_LOAD_ERROR;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn policy(tier: MemoryTier) -> TierPolicy {
    let mut policy = tier.policy();
    policy.group_delay = Duration::ZERO;
    policy.discovery_delay = Duration::ZERO;
    policy
}

async fn get(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

/// A site with a declared sitemap, a page missing its title and a 404 page
async fn mount_site(server: &MockServer) {
    let uri = server.uri();

    get(
        server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nAllow: /\nSitemap: {}/custom-sitemap.xml\n",
            uri
        )),
    )
    .await;
    get(
        server,
        "/custom-sitemap.xml",
        ResponseTemplate::new(200).set_body_string(format!(
            "<?xml version=\"1.0\"?><urlset><url><loc>{}/hidden</loc></url></urlset>",
            uri
        )),
    )
    .await;
    get(
        server,
        "/",
        html(
            200,
            r#"<html><head>
                <title>Acme Organic Dog Food Delivered Weekly</title>
                <meta name="description" content="Fresh organic dog food delivered to your door every week, made from human-grade ingredients.">
                <meta name="viewport" content="width=device-width">
            </head><body>
                <h1>Organic Dog Food</h1>
                <a href="/about">About</a>
                <a href="/missing">Old page</a>
            </body></html>"#,
        ),
    )
    .await;
    get(
        server,
        "/about",
        html(200, "<html><head></head><body><h1>About us</h1><p>We cook.</p></body></html>"),
    )
    .await;
    get(
        server,
        "/hidden",
        html(200, "<html><head><title>Hidden</title></head><body><h1>Hidden</h1></body></html>"),
    )
    .await;
    get(
        server,
        "/missing",
        html(404, "<html><head><title>Not found</title></head><body></body></html>"),
    )
    .await;
}

fn request(server: &MockServer) -> AuditRequest {
    AuditRequest::new("acme", Url::parse(&format!("{}/", server.uri())).unwrap())
}

#[tokio::test]
async fn test_audit_discovers_links_and_declared_sitemap() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let pipeline = AuditPipeline::new(Arc::new(Config::default())).with_policy(policy(MemoryTier::Low));
    let result = pipeline
        .run(&request(&server), &|_: u8| {}, &CancellationToken::new())
        .await
        .unwrap();

    let urls: Vec<&str> = result.discovered_pages.iter().map(|p| p.url.as_str()).collect();
    assert!(urls.iter().any(|u| u.ends_with("/about")), "{:?}", urls);
    assert!(urls.iter().any(|u| u.ends_with("/hidden")), "{:?}", urls);

    let missing = result
        .discovered_pages
        .iter()
        .find(|p| p.url.ends_with("/missing"))
        .unwrap();
    assert_eq!(missing.status_code, 404);
    assert!(missing.issues.iter().any(|i| i == PAGE_LOAD_ERROR));

    // The 404 page and the unreachable https variant are degraded, not dropped
    assert_eq!(result.page_analysis.len(), result.discovered_pages.len());
    assert_eq!(result.failed_pages, 2);
}

#[tokio::test]
async fn test_audit_site_checks_and_score() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let pipeline = AuditPipeline::new(Arc::new(Config::default())).with_policy(policy(MemoryTier::Low));
    let result = pipeline
        .run(&request(&server), &|_: u8| {}, &CancellationToken::new())
        .await
        .unwrap();

    let checks = &result.site_checks;
    assert!(checks.robots.present);
    assert!(checks.robots.allows_root);
    assert_eq!(
        checks.sitemap.location.as_deref(),
        Some(format!("{}/custom-sitemap.xml", server.uri()).as_str())
    );
    assert!(!checks.ssl.https);
    assert!(checks.issues.iter().any(|i| i.kind == "no_https"));
    assert!(checks.broken_links.is_empty(), "broken links are a deep check");

    let about = result
        .meta_analysis
        .iter()
        .find(|p| p.url.ends_with("/about"))
        .unwrap();
    assert!(about.issues.iter().any(|i| i.kind == "missing_title"));

    // Degraded pages contribute no projections
    assert!(result.meta_analysis.iter().all(|p| !p.url.ends_with("/missing")));

    let score = &result.score;
    assert!(score.critical_count >= 2);
    assert_eq!(
        score.total_issues,
        score.critical_count + score.high_count + score.medium_count + score.low_count
    );
    assert!(score.overall_score < 100);
}

#[tokio::test]
async fn test_deep_audit_sweeps_broken_links() {
    let server = MockServer::start().await;
    get(
        &server,
        "/",
        html(
            200,
            r#"<html><head><title>Home</title></head><body><h1>Home</h1><a href="/gone">Gone</a></body></html>"#,
        ),
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pipeline =
        AuditPipeline::new(Arc::new(Config::default())).with_policy(policy(MemoryTier::Medium));
    let result = pipeline
        .run(&request(&server), &|_: u8| {}, &CancellationToken::new())
        .await
        .unwrap();

    let gone = result
        .site_checks
        .broken_links
        .iter()
        .find(|l| l.url.ends_with("/gone"))
        .unwrap();
    assert_eq!(gone.status, Some(404));
    assert!(gone.found_on.starts_with(&server.uri()));
    assert!(result.score.low_count >= 1);
}

#[tokio::test]
async fn test_progress_checkpoints_are_ordered() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let seen = Mutex::new(Vec::new());
    let sink = |p: u8| seen.lock().unwrap().push(p);
    let pipeline = AuditPipeline::new(Arc::new(Config::default())).with_policy(policy(MemoryTier::Low));
    pipeline
        .run(&request(&server), &sink, &CancellationToken::new())
        .await
        .unwrap();

    let seen = seen.into_inner().unwrap();
    for checkpoint in [10, 20, 80, 88, 90, 95] {
        assert!(seen.contains(&checkpoint), "missing {} in {:?}", checkpoint, seen);
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
}

#[tokio::test]
async fn test_max_pages_caps_discovery() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let pipeline = AuditPipeline::new(Arc::new(Config::default())).with_policy(policy(MemoryTier::Low));
    let mut request = request(&server);
    request.max_pages = Some(2);
    let result = pipeline
        .run(&request, &|_: u8| {}, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.discovered_pages.len(), 2);
}

fn discovered_urls(result: &seo_sweep::AuditResult) -> Vec<String> {
    result.discovered_pages.iter().map(|p| p.url.clone()).collect()
}

#[tokio::test]
async fn test_link_cycles_and_redirects_are_visited_once() {
    let server = MockServer::start().await;
    let uri = server.uri();

    get(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_string(format!(
            "<?xml version=\"1.0\"?><urlset><url><loc>{0}/b</loc></url><url><loc>{0}/</loc></url></urlset>",
            uri
        )),
    )
    .await;
    get(
        &server,
        "/",
        html(
            200,
            r#"<html><head><title>A</title></head><body>
                <a href="/b">B</a>
                <a href="/b/">B again</a>
                <a href="/b?utm_source=nav">B tracked</a>
                <a href="/old">Old</a>
            </body></html>"#,
        ),
    )
    .await;
    get(
        &server,
        "/b",
        html(
            200,
            r#"<html><head><title>B</title></head><body><a href="/">A</a><a href="/b#top">B</a></body></html>"#,
        ),
    )
    .await;
    get(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("Location", format!("{}/", uri).as_str()),
    )
    .await;

    let pipeline = AuditPipeline::new(Arc::new(Config::default())).with_policy(policy(MemoryTier::Low));
    let result = pipeline
        .run(&request(&server), &|_: u8| {}, &CancellationToken::new())
        .await
        .unwrap();

    let urls = discovered_urls(&result);
    let mut keys: Vec<String> = urls
        .iter()
        .map(|u| seo_sweep::normalize_url(u).unwrap().to_string())
        .collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), urls.len(), "{:?}", urls);

    // The root, its unreachable https variant and /b; /old lands on the root
    assert_eq!(urls.len(), 3, "{:?}", urls);
    assert_eq!(urls.iter().filter(|u| u.ends_with("/b")).count(), 1);
    assert!(!urls.iter().any(|u| u.ends_with("/old")));
}

#[tokio::test]
async fn test_discovery_stays_on_target_host() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let port = Url::parse(&uri).unwrap().port().unwrap();

    get(
        &server,
        "/sitemap.xml",
        ResponseTemplate::new(200).set_body_string(
            "<?xml version=\"1.0\"?><urlset><url><loc>https://other-site.test/from-sitemap</loc></url></urlset>",
        ),
    )
    .await;
    get(
        &server,
        "/",
        html(
            200,
            &format!(
                r#"<html><head><title>Home</title></head><body>
                    <a href="https://cdn.other-site.test/page">CDN</a>
                    <a href="//third-party.test/x">Protocol-relative</a>
                    <a href="http://blog.localhost:{port}/post">Subdomain</a>
                    <a href="http://www.127.0.0.1.nip.io:{port}/">Lookalike</a>
                    <a href="/local">Local</a>
                </body></html>"#,
                port = port
            ),
        ),
    )
    .await;
    get(
        &server,
        "/local",
        html(200, "<html><head><title>Local</title></head><body></body></html>"),
    )
    .await;

    let pipeline = AuditPipeline::new(Arc::new(Config::default())).with_policy(policy(MemoryTier::Low));
    let result = pipeline
        .run(&request(&server), &|_: u8| {}, &CancellationToken::new())
        .await
        .unwrap();

    let urls = discovered_urls(&result);
    assert!(urls.iter().any(|u| u.ends_with("/local")), "{:?}", urls);
    for url in &urls {
        assert_eq!(Url::parse(url).unwrap().host_str(), Some("127.0.0.1"), "{}", url);
    }
    for analysis in &result.page_analysis {
        assert_eq!(Url::parse(&analysis.url).unwrap().host_str(), Some("127.0.0.1"));
    }
}
