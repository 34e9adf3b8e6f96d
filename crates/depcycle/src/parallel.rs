//! Parallel per-file extraction.
//!
//! Reading and extracting one file needs nothing but the file and the
//! configuration, so batches run on rayon's pool. Workers hand back owned
//! results; the analyzer stays the only writer of shared state.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        analysis run                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Phase 1 (Parallel):    read + extract facts per file        │
//! │  Phase 2 (Sequential):  build the type index                 │
//! │  Phase 3 (Parallel):    per-file contributions               │
//! │  Phase 4 (Sequential):  cache update, graph patch, cycles    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::cache::FileStamp;
use crate::config::AnalyzerConfig;
use crate::error::FileError;
use crate::extract::{FileFacts, extract_facts};
use crate::graph::{FileAnalysis, TypeIndex, analyze_file};

/// One successfully read and extracted file.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to the workspace root
    pub relative_path: PathBuf,
    /// Content fingerprint and metadata at read time
    pub stamp: FileStamp,
    /// Extracted facts
    pub facts: FileFacts,
}

/// Read and extract every path in `paths` (relative to `root`).
///
/// Output order follows input order. Files that cannot be read or are not
/// UTF-8 are returned as errors instead.
#[must_use]
pub fn extract_files(
    root: &Path,
    paths: &[PathBuf],
    config: &AnalyzerConfig,
) -> (Vec<ExtractedFile>, Vec<FileError>) {
    let results: Vec<Result<ExtractedFile, FileError>> = paths
        .par_iter()
        .map(|path| extract_one(root, path, config))
        .collect();

    let mut files = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(file) => files.push(file),
            Err(error) => {
                tracing::warn!(file = %error.path.display(), error = %error.message, "Skipping file");
                errors.push(error);
            }
        }
    }
    (files, errors)
}

/// Read and extract a single file.
///
/// # Errors
///
/// Returns a [`FileError`] if the file cannot be read or is not UTF-8.
pub fn extract_one(
    root: &Path,
    relative_path: &Path,
    config: &AnalyzerConfig,
) -> Result<ExtractedFile, FileError> {
    let absolute = root.join(relative_path);
    let content = std::fs::read(&absolute)
        .map_err(|e| FileError::read_failed(relative_path.to_path_buf(), &e))?;
    let stamp = FileStamp::of(&absolute, &content)
        .map_err(|e| FileError::read_failed(relative_path.to_path_buf(), &e))?;
    let text = std::str::from_utf8(&content)
        .map_err(|_| FileError::encoding_error(relative_path.to_path_buf()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    Ok(ExtractedFile {
        relative_path: relative_path.to_path_buf(),
        stamp,
        facts: extract_facts(relative_path, text, config),
    })
}

/// Compute contributions for every file against a shared index.
#[must_use]
pub fn analyze_files(
    files: &[ExtractedFile],
    index: &TypeIndex,
    config: &AnalyzerConfig,
) -> Vec<FileAnalysis> {
    files
        .par_iter()
        .map(|file| analyze_file(&file.facts, index, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileErrorKind;

    #[test]
    fn extraction_keeps_input_order_and_collects_errors() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join("b.cs"), "namespace B { class Bee {} }").unwrap();
        std::fs::write(dir.path().join("a.cs"), "namespace A { class Ay {} }").unwrap();
        std::fs::write(dir.path().join("bad.cs"), [0xff, 0xfe, 0x00]).unwrap();

        let paths = vec![
            PathBuf::from("b.cs"),
            PathBuf::from("missing.cs"),
            PathBuf::from("a.cs"),
            PathBuf::from("bad.cs"),
        ];
        let (files, errors) = extract_files(dir.path(), &paths, &AnalyzerConfig::default());

        let names: Vec<_> = files.iter().map(|f| f.facts.namespace.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind, FileErrorKind::ReadFailed);
        assert_eq!(errors[1].kind, FileErrorKind::EncodingError);
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join("a.cs"), "\u{feff}namespace A { class Ay {} }").unwrap();

        let file = extract_one(dir.path(), Path::new("a.cs"), &AnalyzerConfig::default()).unwrap();

        assert_eq!(file.facts.namespace, "A");
        assert_eq!(file.stamp.size, 30);
        assert_eq!(file.relative_path, PathBuf::from("a.cs"));
    }
}
