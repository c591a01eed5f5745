//! Audit pipeline - one full crawl, analyze, check and score run
//!
//! The pipeline drives the stages of a single audit in order:
//! - Resolving the memory-tier policy for the run
//! - Discovering pages (or taking a prefetched page list)
//! - Analyzing pages in paced batch groups
//! - Running the site-wide checks
//! - Projecting issues and scoring the site
//!
//! Persistence and job bookkeeping belong to the job runner; the pipeline
//! only reports progress through a `ProgressSink`.

use super::aggregate::{project_issues, tally};
use super::memory_tier::TierPolicy;
use super::scheduler::BatchScheduler;
use super::site_checks::run_site_checks;
use super::types::{AuditResult, ExternalPage};
use crate::analyzer::{AnalysisResult, PageAnalyzer};
use crate::config::Config;
use crate::crawler::{DiscoveredPage, Fetcher, Frontier, FrontierLimits, PAGE_LOAD_ERROR};
use crate::robots::fetch_robots;
use crate::AuditError;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Progress checkpoints of an audit run
pub mod checkpoints {
    pub const DISCOVERY_START: u8 = 10;
    pub const DISCOVERY_DONE: u8 = 20;
    pub const ANALYSIS_DONE: u8 = 80;
    pub const SITE_CHECKS_DONE: u8 = 88;
    pub const AGGREGATED: u8 = 90;
    pub const SCORED: u8 = 95;
    pub const PERSISTED: u8 = 100;
}

/// Receives progress percentages from a running audit
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, progress: u8) {
        self(progress)
    }
}

/// Everything one audit run needs to know about its target
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub audit_id: Uuid,
    pub client_id: String,
    pub base_url: Url,
    /// Requested page cap; clamped to the tier's discovery limit
    pub max_pages: Option<usize>,
    /// Pages from an external content source; when set, discovery is skipped
    pub prefetched_pages: Option<Vec<ExternalPage>>,
    pub config_hash: Option<String>,
}

impl AuditRequest {
    pub fn new(client_id: &str, base_url: Url) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            base_url,
            max_pages: None,
            prefetched_pages: None,
            config_hash: None,
        }
    }
}

/// Runs audits with a fixed configuration
#[derive(Debug, Clone)]
pub struct AuditPipeline {
    config: Arc<Config>,
    policy: Option<TierPolicy>,
}

impl AuditPipeline {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            policy: None,
        }
    }

    /// Uses a fixed policy instead of resolving one when each run starts
    pub fn with_policy(mut self, policy: TierPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one audit to completion
    ///
    /// # Arguments
    ///
    /// * `request` - The target of the audit
    /// * `progress` - Receives the checkpoints 10, 20, 20-80, 88, 90 and 95
    /// * `cancel` - Stops the run at the next stage or batch boundary
    ///
    /// # Returns
    ///
    /// * `Ok(AuditResult)` - The scored result, not yet persisted
    /// * `Err(AuditError)` - The run was cancelled or a stage failed
    pub async fn run(
        &self,
        request: &AuditRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<AuditResult, AuditError> {
        // The tier is fixed when the run starts and never revisited
        let policy = self
            .policy
            .clone()
            .unwrap_or_else(|| TierPolicy::from_config(&self.config.audit));
        let max_pages = policy.clamp_max_pages(request.max_pages);
        let fetcher = Arc::new(Fetcher::new(&self.config.fetcher)?);

        info!(
            audit_id = %request.audit_id,
            base_url = %request.base_url,
            tier = %policy.tier,
            max_pages,
            deep = policy.deep_analysis,
            "Starting audit"
        );

        let mut result = AuditResult::new(
            request.audit_id,
            &request.client_id,
            request.base_url.as_str(),
            policy.clone(),
        );
        result.config_hash = request.config_hash.clone();

        progress.report(checkpoints::DISCOVERY_START);
        ensure_active(cancel)?;

        let robots = fetch_robots(&fetcher, &request.base_url).await;

        result.discovered_pages = match &request.prefetched_pages {
            Some(pages) => pages_from_source(pages, max_pages),
            None => {
                let limits =
                    FrontierLimits::from_config(&self.config.audit, max_pages, policy.discovery_delay);
                let declared = robots.as_ref().map(|r| r.sitemaps()).unwrap_or_default();
                Frontier::new(fetcher.clone(), request.base_url.clone(), limits, cancel.clone())
                    .with_declared_sitemaps(declared)
                    .run()
                    .await
            }
        };
        ensure_active(cancel)?;
        progress.report(checkpoints::DISCOVERY_DONE);
        info!(
            audit_id = %request.audit_id,
            discovered = result.discovered_pages.len(),
            "Discovery stage done"
        );

        let analyses = analyze_pages(
            &fetcher,
            &request.base_url,
            &policy,
            &result.discovered_pages,
            progress,
            cancel,
        )
        .await?;
        result.failed_pages = analyses.iter().filter(|a| a.is_degraded()).count();
        result.page_analysis = analyses.into_iter().map(AnalysisResult::into_analysis).collect();
        progress.report(checkpoints::ANALYSIS_DONE);

        ensure_active(cancel)?;
        result.site_checks = run_site_checks(
            &fetcher,
            &request.base_url,
            robots.as_ref(),
            &result.page_analysis,
            policy.deep_analysis,
            cancel,
        )
        .await;
        ensure_active(cancel)?;
        progress.report(checkpoints::SITE_CHECKS_DONE);

        let projections = project_issues(&result.page_analysis);
        result.meta_analysis = projections.meta;
        result.heading_structure = projections.heading;
        result.image_analysis = projections.image;
        result.link_analysis = projections.link;
        result.content_analysis = projections.content;
        progress.report(checkpoints::AGGREGATED);

        result.score = tally(&result);
        result.completed_at = Some(Utc::now());
        progress.report(checkpoints::SCORED);

        info!(
            audit_id = %request.audit_id,
            analyzed = result.page_analysis.len(),
            failed = result.failed_pages,
            score = result.score.overall_score,
            issues = result.score.total_issues,
            "Audit complete"
        );
        Ok(result)
    }
}

/// Runs one audit with a fresh pipeline
///
/// # Example
///
/// ```no_run
/// # use seo_sweep::audit::{run_audit, AuditRequest};
/// # use seo_sweep::config::Config;
/// # use tokio_util::sync::CancellationToken;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let base = url::Url::parse("https://example.com/")?;
/// let request = AuditRequest::new("acme", base);
/// let result = run_audit(Config::default(), &request, &|p: u8| println!("{}%", p), &CancellationToken::new()).await?;
/// println!("score {}", result.score.overall_score);
/// # Ok(())
/// # }
/// ```
pub async fn run_audit(
    config: Config,
    request: &AuditRequest,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<AuditResult, AuditError> {
    AuditPipeline::new(Arc::new(config))
        .run(request, progress, cancel)
        .await
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), AuditError> {
    if cancel.is_cancelled() {
        Err(AuditError::Cancelled)
    } else {
        Ok(())
    }
}

/// Maps pages from an external content source to discovery records
pub fn pages_from_source(pages: &[ExternalPage], max_pages: usize) -> Vec<DiscoveredPage> {
    pages
        .iter()
        .filter_map(|page| match Url::parse(&page.url) {
            Ok(url) => Some(DiscoveredPage::prefetched(
                &url,
                page.title.clone(),
                page.word_count,
            )),
            Err(e) => {
                warn!(url = %page.url, error = %e, "Skipping prefetched page with invalid URL");
                None
            }
        })
        .take(max_pages)
        .collect()
}

/// Analyzes up to the tier's analysis limit of discovered pages
///
/// Pages that failed to load during discovery are not fetched again; they
/// get a degraded analysis directly.
async fn analyze_pages(
    fetcher: &Arc<Fetcher>,
    base_url: &Url,
    policy: &TierPolicy,
    discovered: &[DiscoveredPage],
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<Vec<AnalysisResult>, AuditError> {
    let analyzer = PageAnalyzer::new(fetcher.clone(), base_url.clone(), policy.deep_analysis);
    let scheduler = BatchScheduler::from_policy(policy);
    let pages: Vec<DiscoveredPage> = discovered
        .iter()
        .take(policy.max_analysis)
        .cloned()
        .collect();

    let span = checkpoints::ANALYSIS_DONE - checkpoints::DISCOVERY_DONE;
    scheduler
        .run(
            pages,
            cancel,
            |page: DiscoveredPage| {
                let analyzer = analyzer.clone();
                async move {
                    if page.is_load_error() {
                        AnalysisResult::degraded(&page.url, page.status_code, PAGE_LOAD_ERROR)
                    } else {
                        analyzer.analyze(&page.url).await
                    }
                }
            },
            |page, reason| AnalysisResult::degraded(&page.url, 0, reason),
            |batch| {
                let done = (batch.fraction() * span as f64).round() as u8;
                progress.report(checkpoints::DISCOVERY_DONE + done.min(span));
            },
        )
        .await
}
