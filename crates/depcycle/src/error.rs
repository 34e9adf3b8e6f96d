//! Error types for depcycle operations.
//!
//! Errors are split into two categories:
//!
//! - **`Error`**: Infrastructure failures that halt an operation (database,
//!   configuration, serialization)
//! - **`FileError`**: Per-file problems that are collected into the analysis
//!   result while the rest of the batch continues
//!
//! ## Error Philosophy
//!
//! Analysis is "best effort":
//! - An unreadable file reduces coverage, it never aborts a run
//! - Malformed source (unbalanced braces, odd syntax) is not an error at all
//! - Only infrastructure failures cause early termination

use std::path::PathBuf;
use thiserror::Error;

/// Result type for depcycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for depcycle operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Cache database operation failed
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// Persisted analysis data could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violated (poisoned lock, dead worker thread)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error encountered while analyzing a specific file.
///
/// Collected during analysis; the analyzer continues with remaining files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    /// Path to the file that failed
    pub path: PathBuf,
    /// Category of the error
    pub kind: FileErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for FileError {}

/// Categorization of per-file errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileErrorKind {
    /// Could not read the file from disk
    ReadFailed,
    /// File content is not valid UTF-8
    EncodingError,
}

impl std::fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "read failed"),
            Self::EncodingError => write!(f, "encoding error"),
        }
    }
}

impl FileError {
    /// Create a new per-file error.
    #[must_use]
    pub fn new(path: PathBuf, kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create an I/O error for a file.
    #[must_use]
    pub fn read_failed(path: PathBuf, error: &std::io::Error) -> Self {
        Self::new(path, FileErrorKind::ReadFailed, error.to_string())
    }

    /// Create an encoding error for a file.
    #[must_use]
    pub fn encoding_error(path: PathBuf) -> Self {
        Self::new(path, FileErrorKind::EncodingError, "file is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_error_display_includes_path_and_kind() {
        let error = FileError::encoding_error(PathBuf::from("Scripts/Player.cs"));

        let display = error.to_string();
        assert!(display.contains("Scripts/Player.cs"));
        assert!(display.contains("not valid UTF-8"));
        assert!(display.contains("encoding error"));
    }

    #[test]
    fn read_failed_keeps_io_message() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = FileError::read_failed(PathBuf::from("a.cs"), &io);

        assert_eq!(error.kind, FileErrorKind::ReadFailed);
        assert!(error.message.contains("access denied"));
    }
}
