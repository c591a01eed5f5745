//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the AuditStore trait.

use crate::audit::AuditResult;
use crate::job::{AuditJob, AuditOptions, Target};
use crate::pages::CanonicalPage;
use crate::state::JobStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{AuditStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

const JOB_COLUMNS: &str = "audit_id, target, options, client_id, url, status, progress, error, \
     attempts, stalled_count, created_at, started_at, completed_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn to_rfc3339(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidValue(format!("timestamp {}: {}", value, e)))
}

fn parse_optional_timestamp(value: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

/// Raw column values of one `audit_jobs` row
struct JobRow {
    audit_id: String,
    target: String,
    options: String,
    client_id: String,
    url: Option<String>,
    status: String,
    progress: i64,
    error: Option<String>,
    attempts: i64,
    stalled_count: i64,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            audit_id: row.get(0)?,
            target: row.get(1)?,
            options: row.get(2)?,
            client_id: row.get(3)?,
            url: row.get(4)?,
            status: row.get(5)?,
            progress: row.get(6)?,
            error: row.get(7)?,
            attempts: row.get(8)?,
            stalled_count: row.get(9)?,
            created_at: row.get(10)?,
            started_at: row.get(11)?,
            completed_at: row.get(12)?,
        })
    }

    fn into_job(self) -> StorageResult<AuditJob> {
        let audit_id = Uuid::parse_str(&self.audit_id)
            .map_err(|e| StorageError::InvalidValue(format!("audit id {}: {}", self.audit_id, e)))?;
        let status = JobStatus::from_db_string(&self.status)
            .ok_or_else(|| StorageError::InvalidValue(format!("job status {}", self.status)))?;
        let target: Target = serde_json::from_str(&self.target)?;
        let options: AuditOptions = serde_json::from_str(&self.options)?;

        Ok(AuditJob {
            audit_id,
            target,
            options,
            client_id: self.client_id,
            url: self.url,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            error: self.error,
            attempts: self.attempts.max(0) as u32,
            stalled_count: self.stalled_count.max(0) as u32,
            created_at: parse_timestamp(&self.created_at)?,
            started_at: parse_optional_timestamp(self.started_at)?,
            completed_at: parse_optional_timestamp(self.completed_at)?,
        })
    }
}

/// Reads a canonical page; the `focus_keyword` and `excluded` columns are authoritative
fn page_from_row(row: &Row<'_>) -> rusqlite::Result<(String, Option<String>, bool)> {
    Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0))
}

fn decode_page(
    (json, focus_keyword, excluded): (String, Option<String>, bool),
) -> StorageResult<CanonicalPage> {
    let mut page: CanonicalPage = serde_json::from_str(&json)?;
    page.seo.focus_keyword = focus_keyword.filter(|k| !k.is_empty());
    page.excluded = excluded;
    Ok(page)
}

fn write_result(conn: &Connection, result: &AuditResult) -> StorageResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO audit_results
            (audit_id, client_id, base_url, overall_score, total_issues, result_json, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            result.audit_id.to_string(),
            result.client_id,
            result.base_url,
            result.score.overall_score as i64,
            result.score.total_issues as i64,
            serde_json::to_string(result)?,
            to_rfc3339(result.completed_at),
        ],
    )?;
    Ok(())
}

fn write_page(conn: &Connection, page: &CanonicalPage) -> StorageResult<()> {
    let focus_keyword = page
        .seo
        .focus_keyword
        .as_deref()
        .filter(|k| !k.trim().is_empty());

    conn.execute(
        "INSERT INTO canonical_pages
            (client_id, slug, url, title, focus_keyword, seo_score, excluded, page_json, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(client_id, slug) DO UPDATE SET
            url = excluded.url,
            title = excluded.title,
            focus_keyword = COALESCE(excluded.focus_keyword, canonical_pages.focus_keyword),
            seo_score = excluded.seo_score,
            page_json = excluded.page_json,
            updated_at = excluded.updated_at",
        params![
            page.client_id,
            page.slug,
            page.url,
            page.title,
            focus_keyword,
            page.seo.seo_score as i64,
            page.excluded as i64,
            serde_json::to_string(page)?,
            page.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl AuditStore for SqliteStorage {
    // ===== Jobs =====

    fn insert_job(&mut self, job: &AuditJob) -> StorageResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO audit_jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                JOB_COLUMNS
            ),
            params![
                job.audit_id.to_string(),
                serde_json::to_string(&job.target)?,
                serde_json::to_string(&job.options)?,
                job.client_id,
                job.url,
                job.status.to_db_string(),
                job.progress as i64,
                job.error,
                job.attempts as i64,
                job.stalled_count as i64,
                job.created_at.to_rfc3339(),
                to_rfc3339(job.started_at),
                to_rfc3339(job.completed_at),
            ],
        )?;
        Ok(())
    }

    fn update_job(&mut self, job: &AuditJob) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE audit_jobs SET target = ?2, options = ?3, client_id = ?4, url = ?5, status = ?6,
                progress = MAX(progress, ?7), error = ?8, attempts = ?9, stalled_count = ?10, started_at = ?11,
                completed_at = ?12
             WHERE audit_id = ?1",
            params![
                job.audit_id.to_string(),
                serde_json::to_string(&job.target)?,
                serde_json::to_string(&job.options)?,
                job.client_id,
                job.url,
                job.status.to_db_string(),
                job.progress as i64,
                job.error,
                job.attempts as i64,
                job.stalled_count as i64,
                to_rfc3339(job.started_at),
                to_rfc3339(job.completed_at),
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::Database(format!(
                "audit job {} does not exist",
                job.audit_id
            )));
        }
        Ok(())
    }

    fn update_job_progress(&mut self, audit_id: Uuid, progress: u8) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE audit_jobs SET progress = MAX(progress, ?2) WHERE audit_id = ?1",
            params![audit_id.to_string(), progress.min(100) as i64],
        )?;
        Ok(())
    }

    fn get_job(&self, audit_id: Uuid) -> StorageResult<Option<AuditJob>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM audit_jobs WHERE audit_id = ?1", JOB_COLUMNS),
                params![audit_id.to_string()],
                JobRow::from_row,
            )
            .optional()?;

        row.map(JobRow::into_job).transpose()
    }

    fn list_jobs(&self, status: Option<JobStatus>) -> StorageResult<Vec<AuditJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM audit_jobs WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at, audit_id",
            JOB_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![status.map(|s| s.to_db_string())], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    // ===== Results =====

    fn save_result(&mut self, result: &AuditResult) -> StorageResult<()> {
        write_result(&self.conn, result)
    }

    fn save_audit(&mut self, result: &AuditResult, pages: &[CanonicalPage]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        write_result(&tx, result)?;
        for page in pages {
            write_page(&tx, page)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_result(&self, audit_id: Uuid) -> StorageResult<Option<AuditResult>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT result_json FROM audit_results WHERE audit_id = ?1",
                params![audit_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|j| serde_json::from_str(&j).map_err(StorageError::from))
            .transpose()
    }

    // ===== Canonical pages =====

    fn upsert_canonical_page(&mut self, page: &CanonicalPage) -> StorageResult<()> {
        write_page(&self.conn, page)
    }

    fn get_canonical_page(
        &self,
        client_id: &str,
        slug: &str,
    ) -> StorageResult<Option<CanonicalPage>> {
        let row = self
            .conn
            .query_row(
                "SELECT page_json, focus_keyword, excluded FROM canonical_pages
                 WHERE client_id = ?1 AND slug = ?2",
                params![client_id, slug],
                page_from_row,
            )
            .optional()?;

        row.map(decode_page).transpose()
    }

    fn list_canonical_pages(&self, client_id: &str) -> StorageResult<Vec<CanonicalPage>> {
        let mut stmt = self.conn.prepare(
            "SELECT page_json, focus_keyword, excluded FROM canonical_pages
             WHERE client_id = ?1 ORDER BY slug",
        )?;

        let rows = stmt
            .query_map(params![client_id], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_page).collect()
    }

    fn set_page_excluded(
        &mut self,
        client_id: &str,
        slug: &str,
        excluded: bool,
    ) -> StorageResult<bool> {
        let updated = self.conn.execute(
            "UPDATE canonical_pages SET excluded = ?3 WHERE client_id = ?1 AND slug = ?2",
            params![client_id, slug, excluded as i64],
        )?;
        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryTier;
    use crate::pages::{normalize_page, ROOT_SLUG};
    use crate::PageAnalysis;

    fn job() -> AuditJob {
        AuditJob::new(
            Target::ByDomain("example.com".to_string()),
            AuditOptions { max_pages: Some(10) },
        )
    }

    fn page(url: &str, keyword: Option<&str>) -> CanonicalPage {
        let mut analysis = PageAnalysis::degraded(url, 200, "");
        analysis.error = None;
        let mut page = normalize_page(&analysis, "acme", None).unwrap();
        page.seo.focus_keyword = keyword.map(String::from);
        page
    }

    #[test]
    fn test_job_roundtrip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let job = job();
        storage.insert_job(&job).unwrap();

        let loaded = storage.get_job(job.audit_id).unwrap().unwrap();
        assert_eq!(loaded.audit_id, job.audit_id);
        assert_eq!(loaded.target, job.target);
        assert_eq!(loaded.options.max_pages, Some(10));
        assert_eq!(loaded.status, JobStatus::Pending);
        assert!(storage.get_job(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_job_and_filter_by_status() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut first = job();
        let second = job();
        storage.insert_job(&first).unwrap();
        storage.insert_job(&second).unwrap();

        first.status = JobStatus::Failed;
        first.error = Some("boom".to_string());
        first.completed_at = Some(Utc::now());
        storage.update_job(&first).unwrap();

        let failed = storage.list_jobs(Some(JobStatus::Failed)).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("boom"));
        assert!(failed[0].completed_at.is_some());
        assert_eq!(storage.list_jobs(None).unwrap().len(), 2);
    }

    #[test]
    fn test_update_missing_job_fails() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.update_job(&job()).is_err());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut job = job();
        storage.insert_job(&job).unwrap();

        storage.update_job_progress(job.audit_id, 40).unwrap();
        storage.update_job_progress(job.audit_id, 20).unwrap();
        assert_eq!(storage.get_job(job.audit_id).unwrap().unwrap().progress, 40);

        job.progress = 10;
        job.status = JobStatus::Queued;
        storage.update_job(&job).unwrap();
        let stored = storage.get_job(job.audit_id).unwrap().unwrap();
        assert_eq!(stored.progress, 40);
        assert_eq!(stored.status, JobStatus::Queued);
    }

    #[test]
    fn test_result_replace() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut result = AuditResult::new(
            Uuid::new_v4(),
            "acme",
            "https://example.com/",
            MemoryTier::Low.policy(),
        );
        storage.save_result(&result).unwrap();

        result.score.overall_score = 88;
        storage.save_result(&result).unwrap();

        let loaded = storage.get_result(result.audit_id).unwrap().unwrap();
        assert_eq!(loaded.score.overall_score, 88);
        assert_eq!(loaded.memory_tier.tier, MemoryTier::Low);
    }

    #[test]
    fn test_save_audit_writes_result_and_pages() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = AuditResult::new(
            Uuid::new_v4(),
            "acme",
            "https://example.com/",
            MemoryTier::Low.policy(),
        );
        let pages = [
            page("https://example.com/", None),
            page("https://example.com/about", Some("about acme")),
        ];
        storage.save_audit(&result, &pages).unwrap();

        assert!(storage.get_result(result.audit_id).unwrap().is_some());
        assert_eq!(storage.list_canonical_pages("acme").unwrap().len(), 2);
    }

    #[test]
    fn test_save_audit_rolls_back_on_failure() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .conn
            .execute_batch("DROP TABLE canonical_pages;")
            .unwrap();
        let result = AuditResult::new(
            Uuid::new_v4(),
            "acme",
            "https://example.com/",
            MemoryTier::Low.policy(),
        );

        let saved = storage.save_audit(&result, &[page("https://example.com/about", None)]);
        assert!(saved.is_err());
        assert!(storage.get_result(result.audit_id).unwrap().is_none());
    }

    #[test]
    fn test_upsert_is_idempotent_by_slug() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut first = page("https://example.com/about", Some("about acme"));
        first.title = "First".to_string();
        storage.upsert_canonical_page(&first).unwrap();

        let mut second = page("https://example.com/about", None);
        second.title = "Second".to_string();
        storage.upsert_canonical_page(&second).unwrap();

        let pages = storage.list_canonical_pages("acme").unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Second");
        assert_eq!(pages[0].seo.focus_keyword.as_deref(), Some("about acme"));
    }

    #[test]
    fn test_new_keyword_replaces_old() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_canonical_page(&page("https://example.com/about", Some("old")))
            .unwrap();
        storage
            .upsert_canonical_page(&page("https://example.com/about", Some("new")))
            .unwrap();

        let stored = storage.get_canonical_page("acme", "about").unwrap().unwrap();
        assert_eq!(stored.seo.focus_keyword.as_deref(), Some("new"));
    }

    #[test]
    fn test_excluded_flag_survives_upsert() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_canonical_page(&page("https://example.com/", None))
            .unwrap();
        assert!(storage.set_page_excluded("acme", ROOT_SLUG, true).unwrap());

        storage
            .upsert_canonical_page(&page("https://example.com/", None))
            .unwrap();
        let stored = storage.get_canonical_page("acme", ROOT_SLUG).unwrap().unwrap();
        assert!(stored.excluded);

        assert!(!storage.set_page_excluded("acme", "missing", true).unwrap());
    }

    #[test]
    fn test_pages_scoped_by_client() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut other = page("https://example.com/about", None);
        other.client_id = "globex".to_string();
        storage.upsert_canonical_page(&other).unwrap();
        storage
            .upsert_canonical_page(&page("https://example.com/about", None))
            .unwrap();

        assert_eq!(storage.list_canonical_pages("acme").unwrap().len(), 1);
        assert_eq!(storage.list_canonical_pages("globex").unwrap().len(), 1);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audits.db");
        let mut storage = SqliteStorage::new(&path).unwrap();
        storage.insert_job(&job()).unwrap();
        assert!(path.exists());
    }
}
