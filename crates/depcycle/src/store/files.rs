//! `file_cache` rows.

use std::path::PathBuf;

use rusqlite::{Transaction, params};

use super::{Store, format_timestamp, normalize_path, parse_timestamp};
use crate::cache::FileCacheEntry;
use crate::error::Result;
use crate::graph::FileAnalysis;

/// Raw column values of one row, decoded outside the row closure so JSON
/// and timestamp errors surface as crate errors.
struct FileRow {
    path: String,
    fingerprint: i64,
    mtime_ns: i64,
    size_bytes: i64,
    namespace: String,
    declared_names: String,
    recorded_names: String,
    last_analyzed: String,
    analysis: String,
}

impl FileRow {
    #[allow(clippy::cast_sign_loss)] // Stored from u64 values
    fn decode(self) -> Result<(FileCacheEntry, FileAnalysis)> {
        let entry = FileCacheEntry {
            file_path: PathBuf::from(self.path),
            content_fingerprint: self.fingerprint as u64,
            last_modified: self.mtime_ns,
            size: self.size_bytes as u64,
            namespace: self.namespace,
            declared_names: serde_json::from_str(&self.declared_names)?,
            recorded_dependency_names: serde_json::from_str(&self.recorded_names)?,
            last_analyzed: parse_timestamp(&self.last_analyzed)?,
        };
        let analysis = serde_json::from_str(&self.analysis)?;
        Ok((entry, analysis))
    }
}

impl Store {
    /// Every cached file with its analysis, ordered by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn load_files(&self) -> Result<Vec<(FileCacheEntry, FileAnalysis)>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT path, fingerprint, mtime_ns, size_bytes, namespace, declared_names,
                    recorded_names, last_analyzed, analysis
             FROM file_cache ORDER BY path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FileRow {
                path: row.get(0)?,
                fingerprint: row.get(1)?,
                mtime_ns: row.get(2)?,
                size_bytes: row.get(3)?,
                namespace: row.get(4)?,
                declared_names: row.get(5)?,
                recorded_names: row.get(6)?,
                last_analyzed: row.get(7)?,
                analysis: row.get(8)?,
            })
        })?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row?.decode()?);
        }
        Ok(files)
    }
}

/// File rows one analysis run writes.
#[derive(Debug, Clone, Copy)]
pub enum FileChanges<'a> {
    /// The complete file set; rows not listed are dropped.
    Replace(&'a [(&'a FileCacheEntry, &'a FileAnalysis)]),
    /// Upsert `saved` and delete `removed`, keeping every other row.
    Patch {
        saved: &'a [(&'a FileCacheEntry, &'a FileAnalysis)],
        removed: &'a [PathBuf],
    },
}

impl FileChanges<'_> {
    /// Number of rows upserted.
    #[must_use]
    pub fn saved(&self) -> usize {
        match self {
            Self::Replace(files) | Self::Patch { saved: files, .. } => files.len(),
        }
    }
}

pub(super) fn write_files(tx: &Transaction<'_>, changes: FileChanges<'_>) -> Result<()> {
    let files = match changes {
        FileChanges::Replace(files) => {
            tx.execute("DELETE FROM file_cache", [])?;
            files
        }
        FileChanges::Patch { saved, removed } => {
            for path in removed {
                tx.execute("DELETE FROM file_cache WHERE path = ?1", [normalize_path(path)])?;
            }
            saved
        }
    };
    for (entry, analysis) in files {
        upsert_file(tx, entry, analysis)?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_wrap)] // Bit pattern preserved, read back as u64
fn upsert_file(tx: &Transaction<'_>, entry: &FileCacheEntry, analysis: &FileAnalysis) -> Result<()> {
    tx.execute(
        "INSERT INTO file_cache (path, fingerprint, mtime_ns, size_bytes, namespace,
                                 declared_names, recorded_names, last_analyzed, analysis)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(path) DO UPDATE SET
             fingerprint = excluded.fingerprint,
             mtime_ns = excluded.mtime_ns,
             size_bytes = excluded.size_bytes,
             namespace = excluded.namespace,
             declared_names = excluded.declared_names,
             recorded_names = excluded.recorded_names,
             last_analyzed = excluded.last_analyzed,
             analysis = excluded.analysis",
        params![
            normalize_path(&entry.file_path),
            entry.content_fingerprint as i64,
            entry.last_modified,
            entry.size as i64,
            entry.namespace,
            serde_json::to_string(&entry.declared_names)?,
            serde_json::to_string(&entry.recorded_dependency_names)?,
            format_timestamp(entry.last_analyzed),
            serde_json::to_string(analysis)?,
        ],
    )?;
    Ok(())
}
