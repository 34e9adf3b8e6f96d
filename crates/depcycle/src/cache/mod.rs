//! Incremental file cache.
//!
//! The cache remembers, for every analyzed file, what it looked like on disk
//! ([`FileCacheEntry`]) and what the analysis made of it ([`FileAnalysis`]).
//! From that it answers three questions for the analyzer:
//!
//! - Which discovered files are new, modified, unchanged or gone
//!   ([`FileCache::classify`])?
//! - Is the change set small enough to patch instead of rebuilding
//!   ([`should_use_incremental`])?
//! - Which other files must be re-extracted when a set of files changes
//!   ([`FileCache::dependents_of`], [`FileCache::invalidate`])?
//!
//! The `(level, full_name)` node index used to re-merge a node after a
//! patch is rebuilt from the analyses after every mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::graph::{FileAnalysis, NodeContribution, NodeKey};

/// Default changed/total ratio up to which incremental patching is used.
pub const DEFAULT_INCREMENTAL_THRESHOLD: f64 = 0.1;

/// Decide between an incremental patch and a full rebuild.
///
/// Returns `true` when `changed / total <= threshold`. An empty tree always
/// gets a full run.
#[must_use]
#[allow(clippy::cast_precision_loss)] // File counts are far below 2^52
pub fn should_use_incremental(changed: usize, total: usize, threshold: f64) -> bool {
    if total == 0 {
        return false;
    }
    changed as f64 / total as f64 <= threshold
}

/// Fingerprint of file content.
#[must_use]
pub fn fingerprint(content: &[u8]) -> u64 {
    xxh3_64(content)
}

/// On-disk identity of a file at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    /// xxh3 of the content
    pub fingerprint: u64,
    /// Modification time in nanoseconds since the Unix epoch (0 if unknown)
    pub mtime_ns: i64,
    /// Size in bytes
    pub size: u64,
}

impl FileStamp {
    /// Stamp already-read `content` with the metadata of `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be stat'ed.
    pub fn of(path: &Path, content: &[u8]) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            fingerprint: fingerprint(content),
            mtime_ns: mtime_ns(&metadata),
            size: metadata.len(),
        })
    }
}

/// Modification time in nanoseconds, 0 when the platform cannot tell.
// u128 nanoseconds won't exceed i64::MAX until year 2262
#[allow(clippy::cast_possible_truncation)]
fn mtime_ns(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos() as i64)
}

/// What the cache knows about one analyzed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCacheEntry {
    /// Path relative to the workspace root
    pub file_path: PathBuf,
    /// xxh3 of the content at analysis time
    pub content_fingerprint: u64,
    /// Modification time at analysis time (ns since epoch)
    pub last_modified: i64,
    /// Size in bytes at analysis time
    pub size: u64,
    /// Declared (or default) namespace
    pub namespace: String,
    /// Short names of the top-level types
    pub declared_names: BTreeSet<String>,
    /// Names the file depends on
    pub recorded_dependency_names: BTreeSet<String>,
    /// When the file was analyzed
    pub last_analyzed: DateTime<Utc>,
}

impl FileCacheEntry {
    /// Build the entry for a freshly analyzed file.
    #[must_use]
    pub fn new(
        file_path: PathBuf,
        stamp: FileStamp,
        analysis: &FileAnalysis,
        last_analyzed: DateTime<Utc>,
    ) -> Self {
        Self {
            file_path,
            content_fingerprint: stamp.fingerprint,
            last_modified: stamp.mtime_ns,
            size: stamp.size,
            namespace: analysis.namespace.clone(),
            declared_names: analysis.declared_names(),
            recorded_dependency_names: analysis.recorded_names.clone(),
            last_analyzed,
        }
    }

    /// Namespace plus declared names: what dependents may have recorded.
    #[must_use]
    pub fn provided_names(&self) -> BTreeSet<String> {
        let mut names = self.declared_names.clone();
        names.insert(self.namespace.clone());
        names
    }
}

/// Outcome of comparing discovered files with the cache.
///
/// Every discovered path lands in exactly one of `new`, `modified` or
/// `unchanged`; `deleted` holds cached paths that were not discovered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Discovered but never analyzed
    pub new: Vec<PathBuf>,
    /// Cached, but size or fingerprint differs (or could not be checked)
    pub modified: Vec<PathBuf>,
    /// Cached and identical
    pub unchanged: Vec<PathBuf>,
    /// Cached but no longer discovered
    pub deleted: Vec<PathBuf>,
}

impl Classification {
    /// New, modified and deleted paths, sorted.
    #[must_use]
    pub fn changed(&self) -> Vec<PathBuf> {
        let mut changed: Vec<PathBuf> = self
            .new
            .iter()
            .chain(&self.modified)
            .chain(&self.deleted)
            .cloned()
            .collect();
        changed.sort();
        changed
    }

    /// Number of changed paths.
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.new.len() + self.modified.len() + self.deleted.len()
    }

    /// Number of paths the decision ratio is taken over.
    #[must_use]
    pub fn total(&self) -> usize {
        self.new.len() + self.modified.len() + self.unchanged.len() + self.deleted.len()
    }
}

/// A file dropped from the cache by [`FileCache::invalidate`].
#[derive(Debug, Clone)]
pub struct RemovedFile {
    /// Its last entry
    pub entry: FileCacheEntry,
    /// Its last analysis
    pub analysis: FileAnalysis,
}

/// Result of [`FileCache::invalidate`].
#[derive(Debug, Clone, Default)]
pub struct Invalidation {
    /// Files that were cached and are now gone from the cache
    pub removed: Vec<RemovedFile>,
    /// Remaining cached files that recorded a name provided by a removed file
    pub dependents: BTreeSet<PathBuf>,
}

/// Per-file entries and analyses with a derived node index.
#[derive(Debug, Clone, Default)]
pub struct FileCache {
    entries: BTreeMap<PathBuf, FileCacheEntry>,
    analyses: BTreeMap<PathBuf, FileAnalysis>,
    by_node: BTreeMap<NodeKey, BTreeSet<PathBuf>>,
}

impl FileCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from persisted `(entry, analysis)` pairs.
    pub fn from_entries(items: impl IntoIterator<Item = (FileCacheEntry, FileAnalysis)>) -> Self {
        let mut cache = Self::new();
        for (entry, analysis) in items {
            cache.analyses.insert(entry.file_path.clone(), analysis);
            cache.entries.insert(entry.file_path.clone(), entry);
        }
        cache.rebuild_indices();
        cache
    }

    /// Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `path` is cached.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Entry for `path`.
    #[must_use]
    pub fn entry(&self, path: &Path) -> Option<&FileCacheEntry> {
        self.entries.get(path)
    }

    /// Analysis for `path`.
    #[must_use]
    pub fn analysis(&self, path: &Path) -> Option<&FileAnalysis> {
        self.analyses.get(path)
    }

    /// Entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &FileCacheEntry> {
        self.entries.values()
    }

    /// `(path, analysis)` pairs in path order.
    pub fn analyses(&self) -> impl Iterator<Item = (&Path, &FileAnalysis)> {
        self.analyses.iter().map(|(p, a)| (p.as_path(), a))
    }

    /// Cached paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Every contribution to the node at `key`, in path order.
    #[must_use]
    pub fn contributions(&self, key: &NodeKey) -> Vec<(&Path, &NodeContribution)> {
        let Some(files) = self.by_node.get(key) else {
            return Vec::new();
        };
        files
            .iter()
            .filter_map(|path| self.analyses.get(path).map(|a| (path.as_path(), a)))
            .flat_map(|(path, analysis)| {
                analysis
                    .contributions
                    .iter()
                    .filter(|c| c.level == key.0 && c.full_name == key.1)
                    .map(move |c| (path, c))
            })
            .collect()
    }

    /// Classify `discovered` paths (relative to `root`) against the cache.
    ///
    /// A file is unchanged only when both its size and its content
    /// fingerprint match the entry. Any failure to stat or read it counts as
    /// a modification so the analyzer gets a chance to report the error.
    #[must_use]
    pub fn classify(&self, root: &Path, discovered: &[PathBuf]) -> Classification {
        let mut classification = Classification::default();
        let mut seen = BTreeSet::new();

        for path in discovered {
            seen.insert(path.as_path());
            let Some(entry) = self.entries.get(path) else {
                classification.new.push(path.clone());
                continue;
            };
            if Self::is_unchanged(&root.join(path), entry) {
                classification.unchanged.push(path.clone());
            } else {
                classification.modified.push(path.clone());
            }
        }

        classification.deleted = self
            .entries
            .keys()
            .filter(|p| !seen.contains(p.as_path()))
            .cloned()
            .collect();

        debug!(
            new = classification.new.len(),
            modified = classification.modified.len(),
            unchanged = classification.unchanged.len(),
            deleted = classification.deleted.len(),
            "Classified files"
        );
        classification
    }

    fn is_unchanged(absolute: &Path, entry: &FileCacheEntry) -> bool {
        let Ok(metadata) = std::fs::metadata(absolute) else {
            return false;
        };
        if metadata.len() != entry.size {
            return false;
        }
        match std::fs::read(absolute) {
            Ok(content) => fingerprint(&content) == entry.content_fingerprint,
            Err(e) => {
                trace!(path = %absolute.display(), error = %e, "Read failed during classification");
                false
            }
        }
    }

    /// Cached files outside `excluding` whose recorded names include any of
    /// `names`.
    #[must_use]
    pub fn dependents_of(
        &self,
        names: &BTreeSet<String>,
        excluding: &BTreeSet<PathBuf>,
    ) -> BTreeSet<PathBuf> {
        if names.is_empty() {
            return BTreeSet::new();
        }
        self.entries
            .values()
            .filter(|e| !excluding.contains(&e.file_path))
            .filter(|e| !e.recorded_dependency_names.is_disjoint(names))
            .map(|e| e.file_path.clone())
            .collect()
    }

    /// Remove `paths` from the cache and find their one-hop dependents.
    ///
    /// Paths that are not cached are ignored. Dependents are cached files
    /// (not themselves invalidated) that recorded the namespace or a declared
    /// name of a removed file.
    pub fn invalidate(&mut self, paths: &[PathBuf]) -> Invalidation {
        let mut removed = Vec::new();
        for path in paths {
            if let (Some(entry), Some(analysis)) =
                (self.entries.remove(path), self.analyses.remove(path))
            {
                removed.push(RemovedFile { entry, analysis });
            }
        }

        let provided: BTreeSet<String> = removed
            .iter()
            .flat_map(|r| r.entry.provided_names())
            .collect();
        let excluding: BTreeSet<PathBuf> = paths.iter().cloned().collect();
        let dependents = self.dependents_of(&provided, &excluding);

        self.rebuild_indices();
        debug!(
            removed = removed.len(),
            dependents = dependents.len(),
            "Invalidated cache entries"
        );
        Invalidation {
            removed,
            dependents,
        }
    }

    /// Insert or replace the entry and analysis for one file.
    pub fn insert(&mut self, entry: FileCacheEntry, analysis: FileAnalysis) {
        self.analyses.insert(entry.file_path.clone(), analysis);
        self.entries.insert(entry.file_path.clone(), entry);
        self.rebuild_indices();
    }

    /// Insert or replace many files, rebuilding indices once.
    pub fn insert_all(&mut self, items: impl IntoIterator<Item = (FileCacheEntry, FileAnalysis)>) {
        for (entry, analysis) in items {
            self.analyses.insert(entry.file_path.clone(), analysis);
            self.entries.insert(entry.file_path.clone(), entry);
        }
        self.rebuild_indices();
    }

    fn rebuild_indices(&mut self) {
        self.by_node.clear();
        for (path, analysis) in &self.analyses {
            for key in analysis.keys() {
                self.by_node.entry(key).or_default().insert(path.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ContributedEdge, TypeSummary};
    use crate::types::{AnalysisLevel, DependencyKind};
    use rstest::rstest;

    /// `types` and `recorded` are space-separated names.
    fn analysis(namespace: &str, types: &str, recorded: &str) -> FileAnalysis {
        FileAnalysis {
            namespace: namespace.to_string(),
            types: types
                .split_whitespace()
                .map(|t| TypeSummary {
                    name: (*t).to_string(),
                    namespace: namespace.to_string(),
                    full_name: format!("{namespace}.{t}"),
                    is_system: false,
                })
                .collect(),
            recorded_names: recorded.split_whitespace().map(ToString::to_string).collect(),
            contributions: vec![NodeContribution {
                level: AnalysisLevel::Namespace,
                name: namespace.to_string(),
                namespace: namespace.to_string(),
                full_name: namespace.to_string(),
                edges: vec![ContributedEdge {
                    target: "Other".to_string(),
                    kind: DependencyKind::Import,
                    line: 1,
                }],
            }],
        }
    }

    fn cache_with(files: &[(&str, &str, &str, &str)]) -> FileCache {
        FileCache::from_entries(files.iter().map(|(path, ns, types, recorded)| {
            let a = analysis(ns, types, recorded);
            let stamp = FileStamp {
                fingerprint: 1,
                mtime_ns: 0,
                size: 0,
            };
            (FileCacheEntry::new(PathBuf::from(path), stamp, &a, Utc::now()), a)
        }))
    }

    #[rstest]
    #[case(5, 100, 0.1, true)]
    #[case(15, 100, 0.1, false)]
    #[case(10, 100, 0.1, true)]
    #[case(0, 100, 0.1, true)]
    #[case(0, 0, 0.1, false)]
    #[case(3, 3, 1.0, true)]
    fn incremental_decision_follows_ratio(
        #[case] changed: usize,
        #[case] total: usize,
        #[case] threshold: f64,
        #[case] expected: bool,
    ) {
        assert_eq!(should_use_incremental(changed, total, threshold), expected);
    }

    #[test]
    fn classify_partitions_discovered_files() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join("same.cs"), "namespace A {}").unwrap();
        std::fs::write(dir.path().join("edited.cs"), "namespace B {}").unwrap();
        std::fs::write(dir.path().join("fresh.cs"), "namespace C {}").unwrap();

        let same = analysis("A", "", "");
        let edited = analysis("B", "", "");
        let gone = analysis("D", "", "");
        let stamp_of = |name: &str| {
            let path = dir.path().join(name);
            FileStamp::of(&path, &std::fs::read(&path).unwrap()).unwrap()
        };
        let stale = FileStamp {
            fingerprint: 42,
            ..stamp_of("edited.cs")
        };
        let cache = FileCache::from_entries([
            (FileCacheEntry::new("same.cs".into(), stamp_of("same.cs"), &same, Utc::now()), same),
            (FileCacheEntry::new("edited.cs".into(), stale, &edited, Utc::now()), edited),
            (
                FileCacheEntry::new("gone.cs".into(), FileStamp { fingerprint: 0, mtime_ns: 0, size: 0 }, &gone, Utc::now()),
                gone,
            ),
        ]);

        let discovered = vec![
            PathBuf::from("edited.cs"),
            PathBuf::from("fresh.cs"),
            PathBuf::from("same.cs"),
        ];
        let result = cache.classify(dir.path(), &discovered);

        assert_eq!(result.new, vec![PathBuf::from("fresh.cs")]);
        assert_eq!(result.modified, vec![PathBuf::from("edited.cs")]);
        assert_eq!(result.unchanged, vec![PathBuf::from("same.cs")]);
        assert_eq!(result.deleted, vec![PathBuf::from("gone.cs")]);
        assert_eq!(result.total(), 4);
        assert_eq!(result.changed_count(), 3);
    }

    #[test]
    fn unreadable_cached_file_counts_as_modified() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let cache = cache_with(&[("missing.cs", "A", "", "")]);

        let result = cache.classify(dir.path(), &[PathBuf::from("missing.cs")]);

        assert_eq!(result.modified, vec![PathBuf::from("missing.cs")]);
    }

    #[test]
    fn invalidate_propagates_one_hop() {
        let mut cache = cache_with(&[
            ("b.cs", "Y", "Bee", "X"),
            ("a.cs", "X", "Ay", "Y Bee"),
            ("c.cs", "Z", "Cee", "Ay"),
            ("d.cs", "W", "", "Unrelated"),
        ]);

        let result = cache.invalidate(&[PathBuf::from("b.cs")]);

        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].entry.namespace, "Y");
        // c.cs depends on a.cs, which is only a dependent: no second hop.
        assert_eq!(result.dependents, BTreeSet::from([PathBuf::from("a.cs")]));
        assert!(!cache.contains(Path::new("b.cs")));
        let gone = (AnalysisLevel::Namespace, "Y".to_string());
        assert!(cache.contributions(&gone).is_empty());
    }

    #[test]
    fn invalidate_ignores_unknown_paths() {
        let mut cache = cache_with(&[("a.cs", "X", "", "Y")]);
        let result = cache.invalidate(&[PathBuf::from("nope.cs")]);
        assert!(result.removed.is_empty());
        assert!(result.dependents.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn node_index_tracks_contributing_files() {
        let mut cache = cache_with(&[("a.cs", "X", "", ""), ("b.cs", "X", "", "")]);
        let key = (AnalysisLevel::Namespace, "X".to_string());

        let contributions = cache.contributions(&key);
        assert_eq!(contributions[0].0, Path::new("a.cs"));
        assert_eq!(contributions[1].0, Path::new("b.cs"));

        assert_eq!(contributions.len(), 2);

        cache.invalidate(&[PathBuf::from("a.cs")]);
        let contributions = cache.contributions(&key);
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].0, Path::new("b.cs"));
    }

    #[test]
    fn dependents_skip_excluded_files() {
        let cache = cache_with(&[("a.cs", "X", "", "Y"), ("b.cs", "Z", "", "Y")]);
        let names = BTreeSet::from(["Y".to_string()]);
        let excluding = BTreeSet::from([PathBuf::from("a.cs")]);

        assert_eq!(
            cache.dependents_of(&names, &excluding),
            BTreeSet::from([PathBuf::from("b.cs")])
        );
    }
}
