//! Audit job execution
//!
//! An audit runs as a durable job: it is recorded when requested, moves
//! through `Pending -> Queued -> Running -> Completed | Failed`, reports
//! monotonic progress, and is retried with backoff or re-dispatched when its
//! execution lock stalls.

pub mod events;
pub mod lock;
mod progress;
pub mod retry;
mod runner;
pub mod worker;

pub use events::{ChannelJobReporter, JobEvent, JobReporter, TracingJobReporter};
pub use lock::ExecutionLock;
pub use progress::ProgressTracker;
pub use retry::RetryPolicy;
pub use runner::JobRunner;
pub use worker::{AuditWorker, WorkerHandle};

use crate::audit::ExternalPage;
use crate::config::Config;
use crate::state::JobStatus;
use crate::url::{extract_domain, parse_site_url};
use crate::AuditError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;
use uuid::Uuid;

/// What an audit is requested for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// A client known to the identity store
    ByClientRef(String),
    /// A bare domain or site URL
    ByDomain(String),
}

impl Target {
    /// The client id a job is filed under before resolution
    pub fn client_key(&self) -> String {
        match self {
            Self::ByClientRef(id) => id.clone(),
            Self::ByDomain(domain) => parse_site_url(domain)
                .ok()
                .and_then(|u| extract_domain(&u))
                .unwrap_or_else(|| domain.trim().to_lowercase()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByClientRef(id) => write!(f, "client:{}", id),
            Self::ByDomain(domain) => write!(f, "domain:{}", domain),
        }
    }
}

/// Per-audit options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditOptions {
    /// Page cap; clamped to the memory tier's discovery limit
    pub max_pages: Option<usize>,
}

/// The durable record of one requested audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditJob {
    pub audit_id: Uuid,
    pub target: Target,
    pub options: AuditOptions,
    pub client_id: String,
    /// Site URL, known once the target is resolved
    pub url: Option<String>,
    pub status: JobStatus,
    /// Percentage in [0, 100]; never decreases
    pub progress: u8,
    pub error: Option<String>,
    /// Dispatches so far, stall re-dispatches included
    pub attempts: u32,
    pub stalled_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AuditJob {
    /// Creates a pending job
    pub fn new(target: Target, options: AuditOptions) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            client_id: target.client_key(),
            target,
            options,
            url: None,
            status: JobStatus::Pending,
            progress: 0,
            error: None,
            attempts: 0,
            stalled_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Moves the job to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: JobStatus) -> Result<(), AuditError> {
        if !self.status.can_transition(next) {
            return Err(AuditError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// A target resolved once when its job starts
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTarget {
    pub client_id: String,
    pub base_url: Url,
    /// Pages supplied by an alternate content source, bypassing discovery
    pub prefetched_pages: Option<Vec<ExternalPage>>,
}

/// The identity store collaborator
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, target: &Target) -> Result<ResolvedTarget, AuditError>;
}

/// Resolves client references from a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    clients: HashMap<String, String>,
    pages: HashMap<String, Vec<ExternalPage>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a resolver from the `[[client]]` entries of a configuration
    pub fn from_config(config: &Config) -> Self {
        config
            .clients
            .iter()
            .fold(Self::new(), |resolver, c| resolver.with_client(&c.id, &c.website))
    }

    pub fn with_client(mut self, id: &str, website: &str) -> Self {
        self.clients.insert(id.to_string(), website.to_string());
        self
    }

    /// Registers a prefetched page list for a client
    pub fn with_pages(mut self, id: &str, pages: Vec<ExternalPage>) -> Self {
        self.pages.insert(id.to_string(), pages);
        self
    }
}

impl TargetResolver for StaticResolver {
    fn resolve(&self, target: &Target) -> Result<ResolvedTarget, AuditError> {
        match target {
            Target::ByClientRef(id) => {
                let website = self
                    .clients
                    .get(id)
                    .ok_or_else(|| AuditError::UnknownTarget(id.clone()))?;
                Ok(ResolvedTarget {
                    client_id: id.clone(),
                    base_url: parse_site_url(website)?,
                    prefetched_pages: self.pages.get(id).cloned(),
                })
            }
            Target::ByDomain(domain) => {
                let base_url = parse_site_url(domain)?;
                let client_id = extract_domain(&base_url)
                    .ok_or_else(|| AuditError::UnknownTarget(domain.clone()))?;
                Ok(ResolvedTarget {
                    client_id,
                    base_url,
                    prefetched_pages: None,
                })
            }
        }
    }
}
