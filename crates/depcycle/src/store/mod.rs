//! `SQLite` persistence for the file cache and the known cycle set.
//!
//! The in-memory [`FileCache`](crate::cache::FileCache) and
//! [`CycleTracker`](crate::cycles::CycleTracker) are the working state; this
//! store is what lets a restarted process pick them up again instead of
//! starting from an empty cache.
//!
//! ## Module Structure
//!
//! - `schema` - Database schema (DDL)
//! - `files` - `file_cache` rows
//! - `cycles` - `known_cycles` rows

mod cycles;
mod files;
mod schema;

pub use files::FileChanges;
pub(crate) use schema::SCHEMA;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

use crate::cycles::KnownCycle;
use crate::error::{Error, Result};
use crate::types::AnalysisLevel;

/// `SQLite` database holding depcycle state.
///
/// The connection is wrapped in a `Mutex` so the store can be shared by
/// reference while staying `Sync`.
pub struct Store {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create the cache database.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = %path.display(), "Opened cache database");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the connection lock.
    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Internal(format!(
                "database connection mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }

    /// Write one run's file rows and the known cycles of `levels` in a
    /// single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any statement fails; nothing is
    /// written in that case.
    pub fn commit_run(
        &self,
        files: FileChanges<'_>,
        levels: &[AnalysisLevel],
        cycles: &[KnownCycle],
    ) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        files::write_files(&tx, files)?;
        cycles::write_known_cycles(&tx, levels, cycles)?;
        tx.commit()?;
        tracing::debug!(files = files.saved(), cycles = cycles.len(), "Persisted analysis run");
        Ok(())
    }

    /// Delete every cached file and known cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    pub fn clear(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch("DELETE FROM file_cache; DELETE FROM known_cycles;")?;
        tracing::info!(path = %self.path.display(), "Cleared cache database");
        Ok(())
    }

    /// Vacuum the database to reclaim space.
    ///
    /// # Errors
    ///
    /// Returns an error if `VACUUM` fails.
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch("VACUUM")?;
        Ok(())
    }
}

/// Normalize a path to forward slashes for storage.
pub(crate) fn normalize_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp '{s}' in cache database: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_db() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("should create temp directory");
        let path = dir.path().join("state").join("cache.db");
        (dir, path)
    }

    #[test]
    fn open_creates_parent_directory_and_schema() {
        let (_dir, path) = temp_db();

        let store = Store::open(&path).expect("failed to open database");
        let conn = store.connection().expect("should get connection");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(tables, vec!["file_cache".to_string(), "known_cycles".to_string()]);
        assert!(path.exists());
    }

    #[test]
    fn reopening_keeps_schema() {
        let (_dir, path) = temp_db();
        drop(Store::open(&path).unwrap());
        assert!(Store::open(&path).is_ok());
    }

    #[test]
    fn timestamps_round_trip_with_nanoseconds() {
        let at = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(at)).unwrap(), at);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
