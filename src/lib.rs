//! Seo-Sweep: an on-page SEO auditor
//!
//! This crate discovers the pages of a website, analyzes each one for on-page
//! SEO deficiencies, scores pages and the whole site, and persists a
//! normalized snapshot per page. Audits run as retryable jobs with progress
//! checkpoints.

pub mod analyzer;
pub mod audit;
pub mod config;
pub mod crawler;
pub mod job;
pub mod output;
pub mod pages;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for audit operations
///
/// Anything that escapes discovery, analysis, aggregation or persistence
/// surfaces as one of these and fails the enclosing job.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Audit not found: {0}")]
    JobNotFound(uuid::Uuid),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: state::JobStatus,
        to: state::JobStatus,
    },

    #[error("Audit exceeded its time budget of {0} seconds")]
    Timeout(u64),

    #[error("Execution lock for audit {0} could not be renewed")]
    Stalled(uuid::Uuid),

    #[error("audit cancelled")]
    Cancelled,

    #[error("Audit stage failed: {0}")]
    Stage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuditError {
    /// Returns true if the retry layer may re-dispatch the audit after this error
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Config(_)
                | Self::UnknownTarget(_)
                | Self::JobNotFound(_)
                | Self::InvalidTransition { .. }
                | Self::Cancelled
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Failures of a single HTTP fetch
///
/// These are always recovered locally: the Frontier and the Page Analyzer
/// turn them into degraded records instead of propagating them.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Classifies a transport error the way the fetcher reports it
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() {
            Self::Connect {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else if let Some(status) = error.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// Result type alias for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use analyzer::{calculate_page_seo_score, AnalysisResult, PageAnalysis, PageAnalyzer};
pub use audit::{AuditResult, MemoryTier};
pub use config::Config;
pub use crawler::{DiscoveredPage, Fetcher, Frontier};
pub use job::{AuditJob, JobRunner, Target};
pub use pages::{normalize_page, CanonicalPage};
pub use state::JobStatus;
pub use url::{extract_domain, normalize_url};
