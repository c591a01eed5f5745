//! Integration tests for audit jobs
//!
//! These tests run audits through the job runner with an on-disk database
//! and check what ends up persisted.

use seo_sweep::audit::{ExternalPage, MemoryTier, TierPolicy};
use seo_sweep::config::{parse_config, Config};
use seo_sweep::job::{AuditOptions, ChannelJobReporter, JobEvent, JobRunner, StaticResolver, Target};
use seo_sweep::output::write_markdown_report;
use seo_sweep::storage::{open_storage, shared, AuditStore};
use seo_sweep::JobStatus;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn fast_policy() -> TierPolicy {
    let mut policy = MemoryTier::Low.policy();
    policy.group_delay = Duration::ZERO;
    policy.discovery_delay = Duration::ZERO;
    policy
}

async fn mount_site(server: &MockServer) {
    for (route, body) in [
        (
            "/",
            "<html><head><title>Home</title></head><body><h1>Home</h1><a href=\"/services\">Services</a></body></html>",
        ),
        (
            "/services",
            "<html><head><title>Services</title></head><body><h1>Services</h1></body></html>",
        ),
        (
            "/pricing",
            "<html><head><title>Pricing</title></head><body><h1>Pricing</h1></body></html>",
        ),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(body))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_job_persists_result_and_report() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("audit.db");

    let (reporter, mut events) = ChannelJobReporter::channel();
    let runner = JobRunner::new(Arc::new(Config::default()), shared(open_storage(&db_path).unwrap()))
        .with_policy(fast_policy())
        .with_reporter(reporter)
        .with_config_hash("abc123");

    let job = runner
        .execute(Target::ByDomain(server.uri()), AuditOptions::default())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);

    // A second connection sees everything the runner wrote
    let reopened = open_storage(&db_path).unwrap();
    let stored_job = reopened.get_job(job.audit_id).unwrap().unwrap();
    assert_eq!(stored_job.status, JobStatus::Completed);
    assert_eq!(stored_job.progress, 100);
    assert_eq!(stored_job.client_id, "127.0.0.1");

    let result = reopened.get_result(job.audit_id).unwrap().unwrap();
    assert_eq!(result.config_hash.as_deref(), Some("abc123"));
    assert!(result.completed_at.is_some());

    // Plain-http pages are never stored as canonical pages
    assert!(reopened.list_canonical_pages("127.0.0.1").unwrap().is_empty());

    let report_path = dir.path().join("report.md");
    write_markdown_report(&result, &report_path).unwrap();
    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains(&format!("**{} / 100**", result.score.overall_score)));

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(match event {
            JobEvent::Waiting { .. } => "waiting",
            JobEvent::Active { .. } => "active",
            JobEvent::Progress { .. } => "progress",
            JobEvent::Completed { .. } => "completed",
            JobEvent::Failed { .. } => "failed",
            JobEvent::Stalled { .. } => "stalled",
        });
    }
    assert_eq!(kinds.first(), Some(&"waiting"));
    assert_eq!(kinds.get(1), Some(&"active"));
    assert_eq!(kinds.last(), Some(&"completed"));
    assert!(!kinds.contains(&"failed"));
}

#[tokio::test]
async fn test_configured_client_is_resolved() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let toml = format!(
        r#"
[audit]
memory-tier = "low"
group-delay-ms = 0
discovery-delay-ms = 0

[output]
database-path = "{}"

[[client]]
id = "acme"
website = "{}"
"#,
        dir.path().join("audit.db").display(),
        server.uri()
    );
    let config = parse_config(&toml).unwrap();
    let store = shared(open_storage(std::path::Path::new(&config.output.database_path)).unwrap());
    let runner = JobRunner::new(Arc::new(config), store);

    let job = runner
        .execute(Target::ByClientRef("acme".into()), AuditOptions { max_pages: Some(5) })
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.client_id, "acme");
    assert_eq!(job.url.as_deref(), Some(format!("{}/", server.uri()).as_str()));
    let result = runner.result(job.audit_id).unwrap().unwrap();
    assert_eq!(result.client_id, "acme");
}

#[tokio::test]
async fn test_prefetched_pages_bypass_discovery() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let pages = ["/services", "/pricing"]
        .iter()
        .map(|route| ExternalPage {
            url: format!("{}{}", server.uri(), route),
            title: None,
            word_count: 0,
            raw_payload: serde_json::json!({ "route": route }),
        })
        .collect();
    let resolver = StaticResolver::new()
        .with_client("acme", &server.uri())
        .with_pages("acme", pages);

    let runner = JobRunner::new(
        Arc::new(Config::default()),
        shared(seo_sweep::storage::SqliteStorage::new_in_memory().unwrap()),
    )
    .with_policy(fast_policy())
    .with_resolver(resolver);

    let job = runner
        .execute(Target::ByClientRef("acme".into()), AuditOptions::default())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let result = runner.result(job.audit_id).unwrap().unwrap();
    let urls: Vec<&str> = result.discovered_pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls.len(), 2, "{:?}", urls);
    assert!(!urls.contains(&format!("{}/", server.uri()).as_str()));
    assert!(urls.iter().any(|u| u.ends_with("/pricing")));
    assert_eq!(result.failed_pages, 0);
}

#[tokio::test]
async fn test_unknown_client_fails_job() {
    let runner = JobRunner::new(
        Arc::new(Config::default()),
        shared(seo_sweep::storage::SqliteStorage::new_in_memory().unwrap()),
    );

    let job = runner
        .execute(Target::ByClientRef("nobody".into()), AuditOptions::default())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap_or("").contains("nobody"));
    assert!(job.completed_at.is_some());
    assert!(runner.result(job.audit_id).unwrap().is_none());
}
