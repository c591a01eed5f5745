//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the audit database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per requested audit
CREATE TABLE IF NOT EXISTS audit_jobs (
    audit_id TEXT PRIMARY KEY,
    target TEXT NOT NULL,
    options TEXT NOT NULL,
    client_id TEXT NOT NULL,
    url TEXT,
    status TEXT NOT NULL,
    progress INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    stalled_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_audit_jobs_status ON audit_jobs(status);
CREATE INDEX IF NOT EXISTS idx_audit_jobs_client ON audit_jobs(client_id);

-- Final result of a completed audit, stored as JSON
CREATE TABLE IF NOT EXISTS audit_results (
    audit_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    base_url TEXT NOT NULL,
    overall_score INTEGER NOT NULL,
    total_issues INTEGER NOT NULL,
    result_json TEXT NOT NULL,
    completed_at TEXT
);

-- Latest snapshot of each page, per client
CREATE TABLE IF NOT EXISTS canonical_pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id TEXT NOT NULL,
    slug TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    focus_keyword TEXT,
    seo_score INTEGER NOT NULL,
    excluded INTEGER NOT NULL DEFAULT 0,
    page_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(client_id, slug)
);

CREATE INDEX IF NOT EXISTS idx_canonical_pages_client ON canonical_pages(client_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["audit_jobs", "audit_results", "canonical_pages"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
