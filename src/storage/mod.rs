//! Storage module for persisting audit data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Audit job records and their status and progress
//! - Final audit results
//! - Canonical page snapshots, upserted per (client, slug)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{AuditStore, StorageError, StorageResult};

use std::path::Path;
use std::sync::{Arc, Mutex};

/// A store shared between the job runner and its tasks
pub type SharedStore = Arc<Mutex<dyn AuditStore>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Wraps a backend for sharing across tasks
pub fn shared<S: AuditStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}
