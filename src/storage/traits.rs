//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::audit::AuditResult;
use crate::job::AuditJob;
use crate::pages::CanonicalPage;
use crate::state::JobStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Jobs and results are read and replaced whole; canonical pages are
/// upserted by (client id, slug). Async callers wrap a backend in
/// `Arc<Mutex<_>>`.
pub trait AuditStore: Send {
    // ===== Jobs =====

    /// Inserts a new job
    fn insert_job(&mut self, job: &AuditJob) -> StorageResult<()>;

    /// Replaces the stored job with the same audit id
    ///
    /// Stored progress is kept when it is higher than the job's.
    fn update_job(&mut self, job: &AuditJob) -> StorageResult<()>;

    /// Raises the stored progress of a job
    ///
    /// The stored value never decreases: a lower `progress` is ignored.
    fn update_job_progress(&mut self, audit_id: Uuid, progress: u8) -> StorageResult<()>;

    /// Gets a job by audit id
    fn get_job(&self, audit_id: Uuid) -> StorageResult<Option<AuditJob>>;

    /// Lists jobs, optionally only those in one status, oldest first
    fn list_jobs(&self, status: Option<JobStatus>) -> StorageResult<Vec<AuditJob>>;

    // ===== Results =====

    /// Stores a result, replacing any earlier result of the same audit
    fn save_result(&mut self, result: &AuditResult) -> StorageResult<()>;

    /// Stores a result and upserts its pages as one unit
    ///
    /// Either everything is written or nothing is.
    fn save_audit(&mut self, result: &AuditResult, pages: &[CanonicalPage]) -> StorageResult<()>;

    /// Gets the result of an audit
    fn get_result(&self, audit_id: Uuid) -> StorageResult<Option<AuditResult>>;

    // ===== Canonical pages =====

    /// Inserts a page or updates the one with the same (client id, slug)
    ///
    /// An existing non-empty focus keyword is kept when the new record has
    /// none. The `excluded` flag of an existing record is never changed.
    fn upsert_canonical_page(&mut self, page: &CanonicalPage) -> StorageResult<()>;

    /// Gets the page stored under (client id, slug)
    fn get_canonical_page(&self, client_id: &str, slug: &str)
        -> StorageResult<Option<CanonicalPage>>;

    /// Lists the pages of a client ordered by slug
    fn list_canonical_pages(&self, client_id: &str) -> StorageResult<Vec<CanonicalPage>>;

    /// Sets the user-controlled `excluded` flag of a page
    ///
    /// Returns false if no such page exists.
    fn set_page_excluded(&mut self, client_id: &str, slug: &str, excluded: bool)
        -> StorageResult<bool>;
}
