//! The job runner
//!
//! Owns every mutation of an audit's job record: status transitions,
//! progress, the error of a failed attempt and the completion timestamp.

use super::events::{JobEvent, JobReporter, TracingJobReporter};
use super::lock::{run_with_lock, Supervision};
use super::progress::ProgressTracker;
use super::retry::RetryPolicy;
use super::{AuditJob, AuditOptions, ResolvedTarget, StaticResolver, Target, TargetResolver};
use crate::audit::{checkpoints, AuditPipeline, AuditRequest, AuditResult, TierPolicy};
use crate::config::Config;
use crate::pages::{normalize_page, slug_for};
use crate::state::JobStatus;
use crate::storage::{AuditStore, SharedStore, StorageError, StorageResult};
use crate::AuditError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// Runs audit jobs against a shared store
#[derive(Clone)]
pub struct JobRunner {
    pipeline: AuditPipeline,
    store: SharedStore,
    resolver: Arc<dyn TargetResolver>,
    reporter: Arc<dyn JobReporter>,
    retry: RetryPolicy,
    timeout: Duration,
    lock_renew: Duration,
    max_stalled: u32,
    cancel: CancellationToken,
    config_hash: Option<String>,
}

impl JobRunner {
    /// Creates a runner whose targets resolve from the config's clients
    pub fn new(config: Arc<Config>, store: SharedStore) -> Self {
        let job = &config.job;
        Self {
            resolver: Arc::new(StaticResolver::from_config(&config)),
            reporter: Arc::new(TracingJobReporter),
            retry: RetryPolicy::from_config(job),
            timeout: Duration::from_secs(job.timeout_secs),
            lock_renew: Duration::from_secs(job.lock_renew_secs),
            max_stalled: job.max_stalled,
            pipeline: AuditPipeline::new(config),
            store,
            cancel: CancellationToken::new(),
            config_hash: None,
        }
    }

    pub fn with_resolver(mut self, resolver: impl TargetResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_reporter(mut self, reporter: impl JobReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Fixes the memory tier policy instead of detecting it per job
    pub fn with_policy(mut self, policy: TierPolicy) -> Self {
        self.pipeline = self.pipeline.with_policy(policy);
        self
    }

    /// Stops running and queued jobs when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Hash of the configuration file, stored with each result
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Records a new job and queues it
    pub fn submit(&self, target: Target, options: AuditOptions) -> Result<AuditJob, AuditError> {
        let mut job = AuditJob::new(target, options);
        job.transition(JobStatus::Queued)?;
        with_store(&self.store, |store| store.insert_job(&job))?;
        self.reporter.report(JobEvent::Waiting {
            audit_id: job.audit_id,
        });
        Ok(job)
    }

    /// Submits a job and runs it in the background
    ///
    /// Returns the queued job at once; its progress is readable through
    /// [`JobRunner::job`] while the returned handle is pending.
    pub fn run_audit(
        &self,
        target: Target,
        options: AuditOptions,
    ) -> Result<(AuditJob, JoinHandle<Result<AuditJob, AuditError>>), AuditError> {
        let job = self.submit(target, options)?;
        let runner = self.clone();
        let audit_id = job.audit_id;
        let handle = tokio::spawn(async move { runner.run_job(audit_id).await });
        Ok((job, handle))
    }

    /// Submits a job and runs it to a terminal state
    pub async fn execute(&self, target: Target, options: AuditOptions) -> Result<AuditJob, AuditError> {
        let job = self.submit(target, options)?;
        self.run_job(job.audit_id).await
    }

    /// Gets a job, including its current progress
    pub fn job(&self, audit_id: Uuid) -> Result<Option<AuditJob>, AuditError> {
        with_store(&self.store, |store| store.get_job(audit_id))
    }

    /// Gets the result of a completed audit
    pub fn result(&self, audit_id: Uuid) -> Result<Option<AuditResult>, AuditError> {
        with_store(&self.store, |store| store.get_result(audit_id))
    }

    /// Runs a queued job until it completes or fails for good
    ///
    /// Failed attempts are retried with backoff while attempts remain and the
    /// error allows it; stalled attempts are re-dispatched at once, up to the
    /// stall limit. The returned job is always terminal. An `Err` means the
    /// job could not be run or its record could not be written.
    pub async fn run_job(&self, audit_id: Uuid) -> Result<AuditJob, AuditError> {
        let mut job = self.job(audit_id)?.ok_or(AuditError::JobNotFound(audit_id))?;
        if job.status != JobStatus::Queued {
            return Err(AuditError::InvalidTransition {
                from: job.status,
                to: JobStatus::Running,
            });
        }

        let progress = Arc::new(ProgressTracker::starting_at(job.progress));
        let mut resolved: Option<ResolvedTarget> = None;

        loop {
            job.transition(JobStatus::Running)?;
            job.attempts += 1;
            job.started_at.get_or_insert_with(Utc::now);
            self.save(&job)?;
            self.reporter.report(JobEvent::Active {
                audit_id,
                attempt: job.attempts,
            });

            let outcome = match self.resolve_once(&mut job, &mut resolved) {
                Ok(target) => self.attempt(&job, target, &progress).await,
                Err(e) => Err(e),
            };
            job.progress = progress.current();
            let outcome = outcome.and_then(|result| {
                let saved = self.persist(&result)?;
                Ok((result, saved))
            });

            let err = match outcome {
                Ok((result, saved)) => {
                    self.complete(&mut job, &result, saved, &progress)?;
                    return Ok(job);
                }
                Err(e) => e,
            };

            if matches!(err, AuditError::Stalled(_)) && job.stalled_count < self.max_stalled {
                job.stalled_count += 1;
                job.transition(JobStatus::Queued)?;
                self.save(&job)?;
                self.reporter.report(JobEvent::Stalled {
                    audit_id,
                    stalled_count: job.stalled_count,
                });
                continue;
            }

            let failures = job.attempts.saturating_sub(job.stalled_count);
            let will_retry = !matches!(err, AuditError::Stalled(_))
                && !self.cancel.is_cancelled()
                && self.retry.should_retry(failures, &err);
            job.error = Some(err.to_string());
            self.reporter.report(JobEvent::Failed {
                audit_id,
                error: err.to_string(),
                will_retry,
            });

            if !will_retry {
                self.fail(&mut job)?;
                return Ok(job);
            }

            job.transition(JobStatus::Queued)?;
            self.save(&job)?;
            let delay = self.retry.delay_for_attempt(failures);
            info!(%audit_id, attempt = job.attempts, delay_secs = delay.as_secs(), "Retrying audit");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    let cancelled = AuditError::Cancelled.to_string();
                    job.error = Some(cancelled.clone());
                    self.reporter.report(JobEvent::Failed {
                        audit_id,
                        error: cancelled,
                        will_retry: false,
                    });
                    self.fail(&mut job)?;
                    return Ok(job);
                }
            }
        }
    }

    /// Resolves the target on the first successful dispatch only
    fn resolve_once(
        &self,
        job: &mut AuditJob,
        cached: &mut Option<ResolvedTarget>,
    ) -> Result<ResolvedTarget, AuditError> {
        if let Some(target) = cached {
            return Ok(target.clone());
        }
        let target = self.resolver.resolve(&job.target)?;
        job.client_id = target.client_id.clone();
        job.url = Some(target.base_url.to_string());
        self.save(job)?;
        *cached = Some(target.clone());
        Ok(target)
    }

    /// One supervised run of the pipeline
    async fn attempt(
        &self,
        job: &AuditJob,
        target: ResolvedTarget,
        progress: &Arc<ProgressTracker>,
    ) -> Result<AuditResult, AuditError> {
        let request = AuditRequest {
            audit_id: job.audit_id,
            client_id: target.client_id,
            base_url: target.base_url,
            max_pages: job.options.max_pages,
            prefetched_pages: target.prefetched_pages,
            config_hash: self.config_hash.clone(),
        };

        let audit_id = job.audit_id;
        let store = self.store.clone();
        let reporter = self.reporter.clone();
        let tracker = progress.clone();
        let sink = move |p: u8| {
            if let Some(p) = tracker.advance(p) {
                if let Err(e) = with_store(&store, |s| s.update_job_progress(audit_id, p)) {
                    warn!(%audit_id, error = %e, "Failed to record progress");
                }
                reporter.report(JobEvent::Progress {
                    audit_id,
                    progress: p,
                });
            }
        };

        let supervision = Supervision {
            audit_id,
            lock_renew: self.lock_renew,
            timeout: self.timeout,
        };
        let pipeline = self.pipeline.clone();
        run_with_lock(supervision, &self.cancel, move |token| async move {
            pipeline.run(&request, &sink, &token).await
        })
        .await
    }

    /// Writes the result and its canonical pages
    ///
    /// A failure here fails the attempt like any other stage error.
    fn persist(&self, result: &AuditResult) -> Result<usize, AuditError> {
        with_store(&self.store, |store| persist_pages(store, &result.client_id, result))
    }

    fn complete(
        &self,
        job: &mut AuditJob,
        result: &AuditResult,
        saved: usize,
        progress: &ProgressTracker,
    ) -> Result<(), AuditError> {
        progress.advance(checkpoints::PERSISTED);
        job.progress = progress.current();
        job.error = None;
        job.completed_at = Some(Utc::now());
        job.transition(JobStatus::Completed)?;
        self.save(job)?;

        info!(audit_id = %job.audit_id, pages = saved, "Audit persisted");
        self.reporter.report(JobEvent::Progress {
            audit_id: job.audit_id,
            progress: job.progress,
        });
        self.reporter.report(JobEvent::Completed {
            audit_id: job.audit_id,
            score: result.score.overall_score,
        });
        Ok(())
    }

    fn fail(&self, job: &mut AuditJob) -> Result<(), AuditError> {
        job.completed_at = Some(Utc::now());
        job.transition(JobStatus::Failed)?;
        self.save(job)
    }

    fn save(&self, job: &AuditJob) -> Result<(), AuditError> {
        with_store(&self.store, |store| store.update_job(job))
    }
}

/// Saves a result together with the canonical page of every analysis that
/// normalizes to one
///
/// Returns the number of pages written.
fn persist_pages(
    store: &mut dyn AuditStore,
    client_id: &str,
    result: &AuditResult,
) -> StorageResult<usize> {
    let mut pages = Vec::new();
    for analysis in &result.page_analysis {
        let Ok(url) = Url::parse(&analysis.url) else {
            continue;
        };
        let prior = store.get_canonical_page(client_id, &slug_for(&url))?;
        pages.extend(normalize_page(analysis, client_id, prior.as_ref()));
    }
    store.save_audit(result, &pages)?;
    Ok(pages.len())
}

fn with_store<T>(
    store: &SharedStore,
    f: impl FnOnce(&mut dyn AuditStore) -> StorageResult<T>,
) -> Result<T, AuditError> {
    let mut guard = store
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))?;
    Ok(f(&mut *guard)?)
}
