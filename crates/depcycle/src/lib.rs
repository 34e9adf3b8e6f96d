//! # depcycle: Incremental Circular Dependency Tracking
//!
//! depcycle keeps a dependency graph of a C#/Unity source tree at three
//! granularities (namespaces, top-level types, and ECS "systems") and tracks
//! the circular dependencies in each across repeated analyses. Files are
//! re-extracted only when they or the names they use change; cycles keep a
//! stable identity from run to run so new and resolved ones can be reported.
//!
//! ## Design Philosophy
//!
//! - **Structural, not semantic** - Regex-level extraction, no type checker
//! - **Incremental** - A patched run gives the same graphs as a full one
//! - **Stable identity** - The same loop found from another node is the same cycle
//! - **Library first** - The CLI and the background service are thin layers
//!
//! ## Quick Start
//!
//! ```no_run
//! use depcycle::Analyzer;
//! use std::path::Path;
//!
//! let mut analyzer = Analyzer::new(Path::new("/path/to/unity/project"))?;
//!
//! let result = analyzer.update()?;
//! for cycle in result.new_cycles() {
//!     println!("[{}] {}", cycle.level, cycle.path_string());
//!     for fix in analyzer.suggest_fixes(cycle) {
//!         println!("  {:?}: {}", fix.priority, fix.description);
//!     }
//! }
//! # Ok::<(), depcycle::Error>(())
//! ```

pub mod cache;
pub mod config;
pub mod cycles;
mod error;
pub mod extract;
pub mod graph;
pub mod parallel;
pub mod service;
pub mod store;
mod types;

pub use config::AnalyzerConfig;
pub use error::{Error, FileError, FileErrorKind, Result};
pub use types::{
    AnalysisLevel, AnalysisMode, AnalysisResult, Cycle, CycleEdge, CycleStats, DependencyDetail,
    DependencyKind, DependencyNode, FixKind, FixSuggestion, ResolvedCycle, SuggestionPriority,
};

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use cache::{FileCache, FileCacheEntry, should_use_incremental};
use config::{CACHE_DB_NAME, STATE_DIR_NAME};
use cycles::{CycleDiff, CycleTracker, KnownCycle};
use graph::{DependencyGraphs, FileAnalysis, FileUpdate, NodeKey, TypeIndex, TypeSummary};
use parallel::{ExtractedFile, analyze_files, extract_files};
use store::{FileChanges, Store};

/// An analysis run that has been computed but not yet committed.
///
/// Holds the candidate cache and graphs. Dropping it leaves the analyzer
/// (cache, graphs, known cycles, database) exactly as it was.
#[derive(Debug)]
pub struct PreparedRun {
    mode: AnalysisMode,
    cache: FileCache,
    graphs: DependencyGraphs,
    diff: CycleDiff,
    saved: Vec<PathBuf>,
    removed: Vec<PathBuf>,
    affected_files: Vec<PathBuf>,
    errors: Vec<FileError>,
    timestamp: DateTime<Utc>,
    started: Instant,
}

impl PreparedRun {
    /// Full rebuild or incremental patch.
    #[must_use]
    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    /// Current cycles as classified against the known set.
    #[must_use]
    pub fn cycles(&self) -> &[Cycle] {
        &self.diff.cycles
    }
}

/// Multi-level dependency graph and cycle tracker for one workspace.
///
/// `Analyzer` owns the working state: the file cache, the three level
/// graphs, and the set of known cycles. Each run updates all of them and the
/// cache database together, or none of them.
pub struct Analyzer {
    workspace_root: PathBuf,
    config: AnalyzerConfig,
    store: Store,
    cache: FileCache,
    graphs: DependencyGraphs,
    tracker: CycleTracker,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("workspace_root", &self.workspace_root)
            .field("files", &self.cache.len())
            .field("nodes", &self.graphs.node_count())
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// Open the analyzer for a workspace.
    ///
    /// Loads `<root>/.depcycle/config.yaml` when present and restores the
    /// cache and known cycles from `<root>/.depcycle/cache.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist, the configuration is
    /// invalid, or the database cannot be opened.
    pub fn new(workspace_root: &Path) -> Result<Self> {
        let workspace_root = canonical_root(workspace_root)?;
        let config = AnalyzerConfig::load_or_default(&workspace_root)?;
        Self::with_config(&workspace_root, config)
    }

    /// Open the analyzer with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist, `config` is invalid, or
    /// the database cannot be opened or read.
    pub fn with_config(workspace_root: &Path, config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let workspace_root = canonical_root(workspace_root)?;

        let db_path = workspace_root.join(STATE_DIR_NAME).join(CACHE_DB_NAME);
        let store = Store::open(&db_path)?;

        let cache = FileCache::from_entries(store.load_files()?);
        let graphs = DependencyGraphs::from_analyses(cache.analyses());
        let tracker = CycleTracker::from_known(store.load_known_cycles()?);

        debug!(
            root = %workspace_root.display(),
            files = cache.len(),
            nodes = graphs.node_count(),
            known_cycles = tracker.known().count(),
            "Restored analyzer state"
        );

        Ok(Self {
            workspace_root,
            config,
            store,
            cache,
            graphs,
            tracker,
        })
    }

    /// Canonical workspace root.
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Path to the cache database.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.store.path()
    }

    /// Graphs as of the last committed run.
    #[must_use]
    pub fn graphs(&self) -> &DependencyGraphs {
        &self.graphs
    }

    /// File cache as of the last committed run.
    #[must_use]
    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Cycles remembered from the last committed run.
    pub fn known_cycles(&self) -> impl Iterator<Item = &KnownCycle> {
        self.tracker.known()
    }

    // === Runs ===

    /// Re-extract every file and rebuild all graphs.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be walked or the database
    /// cannot be written. Per-file problems are reported in the result.
    pub fn run_full_analysis(&mut self) -> Result<AnalysisResult> {
        let run = self.prepare_full()?;
        self.commit(run)
    }

    /// Re-extract `changed_paths` (and their dependents) and patch the graphs.
    ///
    /// Paths may be absolute or relative to the root. A path that no longer
    /// exists, or is no longer an analyzable source file, is treated as
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be written.
    pub fn run_incremental_analysis(&mut self, changed_paths: &[PathBuf]) -> Result<AnalysisResult> {
        let run = self.prepare_incremental(changed_paths);
        self.commit(run)
    }

    /// Rescan the workspace and run incrementally or fully, whichever the
    /// change ratio calls for.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be walked or the database
    /// cannot be written.
    pub fn update(&mut self) -> Result<AnalysisResult> {
        let run = self.prepare_update()?;
        self.commit(run)
    }

    /// Compute a full rebuild without committing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be walked.
    pub fn prepare_full(&self) -> Result<PreparedRun> {
        let started = Instant::now();
        let paths = self.discover_files()?;
        info!(files = paths.len(), "Starting full analysis");

        let (files, errors) = extract_files(&self.workspace_root, &paths, &self.config);

        let mut index = TypeIndex::new();
        for file in &files {
            index.insert(&file.relative_path, &TypeSummary::from_facts(&file.facts));
        }
        let analyses = analyze_files(&files, &index, &self.config);

        let now = Utc::now();
        let cache = FileCache::from_entries(
            files
                .iter()
                .zip(analyses)
                .map(|(file, analysis)| (cache_entry(file, &analysis, now), analysis)),
        );
        let graphs = DependencyGraphs::from_analyses(cache.analyses());
        let diff = cycles::diff_levels(&self.tracker, &graphs, &self.config.levels, now);

        let saved = cache.paths().map(Path::to_path_buf).collect();
        let removed = self
            .cache
            .paths()
            .filter(|p| !cache.contains(p))
            .map(Path::to_path_buf)
            .collect();

        Ok(PreparedRun {
            mode: AnalysisMode::Full,
            affected_files: files.into_iter().map(|f| f.relative_path).collect(),
            cache,
            graphs,
            diff,
            saved,
            removed,
            errors,
            timestamp: now,
            started,
        })
    }

    /// Compute an incremental patch for `changed_paths` without committing it.
    #[must_use]
    pub fn prepare_incremental(&self, changed_paths: &[PathBuf]) -> PreparedRun {
        let started = Instant::now();
        let changed: BTreeSet<PathBuf> = changed_paths
            .iter()
            .filter_map(|p| self.relative_path(p))
            .collect();

        let (to_parse, gone): (Vec<PathBuf>, Vec<PathBuf>) = changed
            .iter()
            .cloned()
            .partition(|p| self.is_analyzable(p));
        debug!(
            reparse = to_parse.len(),
            removed = gone.len(),
            "Starting incremental analysis"
        );

        let (mut parsed, mut errors) = extract_files(&self.workspace_root, &to_parse, &self.config);

        // Names whose meaning may have changed: everything the changed files
        // provided before, and everything they provide now.
        let mut cache = self.cache.clone();
        let all_changed: Vec<PathBuf> = changed.iter().cloned().collect();
        let invalidation = cache.invalidate(&all_changed);
        let new_names: BTreeSet<String> = parsed
            .iter()
            .flat_map(|f| {
                let mut names = f.facts.declared_names();
                names.insert(f.facts.namespace.clone());
                names
            })
            .collect();
        let mut dependents = invalidation.dependents;
        dependents.extend(cache.dependents_of(&new_names, &changed));

        let dependent_paths: Vec<PathBuf> = dependents.into_iter().collect();
        let (dependent_files, dependent_errors) =
            extract_files(&self.workspace_root, &dependent_paths, &self.config);

        // Node keys whose contributions change: old keys of everything
        // re-extracted or removed, new keys of everything re-extracted.
        let mut affected: BTreeSet<NodeKey> = invalidation
            .removed
            .iter()
            .flat_map(|r| r.analysis.keys())
            .collect();
        for path in &dependent_paths {
            if let Some(analysis) = cache.analysis(path) {
                affected.extend(analysis.keys());
            }
        }
        let failed_dependents: Vec<PathBuf> =
            dependent_errors.iter().map(|e| e.path.clone()).collect();
        cache.invalidate(&failed_dependents);
        errors.extend(dependent_errors);
        parsed.extend(dependent_files);

        let reparsed: BTreeSet<&Path> = parsed.iter().map(|f| f.relative_path.as_path()).collect();
        let mut index = TypeIndex::new();
        for (path, analysis) in cache.analyses() {
            if !reparsed.contains(path) {
                index.insert(path, &analysis.types);
            }
        }
        for file in &parsed {
            index.insert(&file.relative_path, &TypeSummary::from_facts(&file.facts));
        }
        let analyses = analyze_files(&parsed, &index, &self.config);

        let now = Utc::now();
        for analysis in &analyses {
            affected.extend(analysis.keys());
        }
        cache.insert_all(
            parsed
                .iter()
                .zip(analyses)
                .map(|(file, analysis)| (cache_entry(file, &analysis, now), analysis)),
        );

        let mut graphs = self.graphs.clone();
        for key in &affected {
            graphs.patch(key, &cache.contributions(key));
        }
        let diff = cycles::diff_levels(&self.tracker, &graphs, &self.config.levels, now);

        let removed: Vec<PathBuf> = self
            .cache
            .paths()
            .filter(|p| !cache.contains(p))
            .map(Path::to_path_buf)
            .collect();
        let saved: Vec<PathBuf> = parsed.iter().map(|f| f.relative_path.clone()).collect();

        PreparedRun {
            mode: AnalysisMode::Incremental,
            affected_files: saved.clone(),
            cache,
            graphs,
            diff,
            saved,
            removed,
            errors,
            timestamp: now,
            started,
        }
    }

    /// Rescan, classify, and prepare whichever run the change ratio calls
    /// for, without committing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace cannot be walked.
    pub fn prepare_update(&self) -> Result<PreparedRun> {
        let discovered = self.discover_files()?;
        let classification = self.cache.classify(&self.workspace_root, &discovered);
        let changed = classification.changed_count();
        let total = classification.total();

        if should_use_incremental(changed, total, self.config.incremental_threshold) {
            debug!(changed, total, "Change ratio within threshold, patching");
            Ok(self.prepare_incremental(&classification.changed()))
        } else {
            debug!(changed, total, "Change ratio above threshold, rebuilding");
            self.prepare_full()
        }
    }

    /// Make `run` the current state: persist it, then adopt its cache,
    /// graphs and cycles.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be written; the analyzer is
    /// unchanged in that case.
    pub fn commit(&mut self, run: PreparedRun) -> Result<AnalysisResult> {
        let mut tracker = self.tracker.clone();
        tracker.commit(&self.config.levels, &run.diff.cycles);
        let known: Vec<KnownCycle> = tracker.known().cloned().collect();

        let rows = cache_rows(&run.cache, &run.saved);
        let files = match run.mode {
            AnalysisMode::Full => FileChanges::Replace(&rows),
            AnalysisMode::Incremental => FileChanges::Patch {
                saved: &rows,
                removed: &run.removed,
            },
        };
        self.store.commit_run(files, &self.config.levels, &known)?;

        self.tracker = tracker;
        self.cache = run.cache;
        self.graphs = run.graphs;

        let result = AnalysisResult {
            dependencies: self.graphs.clone(),
            circular_dependencies: run.diff.cycles,
            resolved: run.diff.resolved,
            analysis_levels: self.config.levels.clone(),
            mode: run.mode,
            timestamp: run.timestamp,
            affected_files: run.affected_files,
            total_files: self.cache.len(),
            errors: run.errors,
            duration: run.started.elapsed(),
        };

        info!(
            mode = %result.mode,
            files = result.total_files,
            affected = result.affected_files.len(),
            cycles = result.circular_dependencies.len(),
            new = result.new_cycles().count(),
            resolved = result.resolved.len(),
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis(),
            "Analysis complete"
        );
        Ok(result)
    }

    /// Forget all cached files and known cycles.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be cleared.
    pub fn reset(&mut self) -> Result<()> {
        self.store.clear()?;
        self.store.vacuum()?;
        self.cache = FileCache::new();
        self.graphs = DependencyGraphs::new();
        self.tracker = CycleTracker::new();
        Ok(())
    }

    // === Queries ===

    /// Re-extract one file against the current state without applying it.
    ///
    /// The returned update lists every node the file contributed to before
    /// or would contribute to now.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not UTF-8.
    pub fn parse_changed_file(&self, path: &Path) -> Result<FileUpdate> {
        let relative = self.relative_path(path).ok_or_else(|| {
            Error::Config(format!(
                "{} is outside the workspace {}",
                path.display(),
                self.workspace_root.display()
            ))
        })?;
        let file = parallel::extract_one(&self.workspace_root, &relative, &self.config)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        let mut index = TypeIndex::new();
        for (cached, analysis) in self.cache.analyses() {
            if cached != relative {
                index.insert(cached, &analysis.types);
            }
        }
        index.insert(&relative, &TypeSummary::from_facts(&file.facts));

        let analysis = graph::analyze_file(&file.facts, &index, &self.config);
        Ok(FileUpdate::new(
            relative.clone(),
            self.cache.analysis(&relative),
            analysis,
        ))
    }

    /// Edges of `cycle` with the evidence recorded in the current graphs.
    #[must_use]
    pub fn get_cycle_details(&self, cycle: &Cycle) -> Vec<CycleEdge> {
        cycles::cycle_edges(&cycle.members, self.graphs.level(cycle.level))
    }

    /// Aggregate metrics over `cycles`.
    #[must_use]
    pub fn get_cycle_stats(&self, cycles: &[Cycle]) -> CycleStats {
        crate::cycles::cycle_stats(cycles)
    }

    /// Ranked ways to break `cycle`.
    #[must_use]
    pub fn suggest_fixes(&self, cycle: &Cycle) -> Vec<FixSuggestion> {
        cycles::suggest_fixes(cycle, self.graphs.level(cycle.level))
    }

    // === Discovery ===

    /// Discover all analyzable source files, relative to the root and sorted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the root itself cannot be read.
    pub fn discover_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        std::fs::read_dir(&self.workspace_root)?;
        self.walk_dir(&self.workspace_root, &mut files);
        files.sort();
        Ok(files)
    }

    /// Recursively walk a directory, collecting source files.
    ///
    /// Directories that cannot be read are logged and skipped.
    fn walk_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(
                    directory = %dir.display(),
                    error = %e,
                    "Cannot read directory, skipping"
                );
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        directory = %dir.display(),
                        error = %e,
                        "Failed to read directory entry, skipping"
                    );
                    continue;
                }
            };

            let path = entry.path();
            if path.is_dir() {
                let excluded = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| self.config.is_excluded_dir(name));
                if !excluded {
                    self.walk_dir(&path, files);
                }
            } else if path.is_file() && self.config.is_source_file(&path) {
                if let Ok(relative) = path.strip_prefix(&self.workspace_root) {
                    files.push(relative.to_path_buf());
                }
            }
        }
    }

    /// Whether a relative path would be found by discovery right now.
    fn is_analyzable(&self, relative: &Path) -> bool {
        let in_excluded_dir = relative
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .any(|c| {
                c.as_os_str()
                    .to_str()
                    .is_some_and(|name| self.config.is_excluded_dir(name))
            });
        !in_excluded_dir
            && self.config.is_source_file(relative)
            && self.workspace_root.join(relative).is_file()
    }

    /// `path` relative to the root, or `None` if it lies outside it.
    fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(without_cur_dir(path));
        }
        if let Ok(relative) = path.strip_prefix(&self.workspace_root) {
            return Some(without_cur_dir(relative));
        }
        // The root is canonical; the path may reach it through a symlink.
        let canonical = path
            .parent()
            .and_then(|p| p.canonicalize().ok())
            .zip(path.file_name())
            .map(|(dir, name)| dir.join(name))?;
        match canonical.strip_prefix(&self.workspace_root) {
            Ok(relative) => Some(relative.to_path_buf()),
            Err(_) => {
                warn!(path = %path.display(), "Ignoring path outside the workspace");
                None
            }
        }
    }
}

/// `./a.cs` and `a.cs` name the same cache entry.
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn canonical_root(workspace_root: &Path) -> Result<PathBuf> {
    workspace_root.canonicalize().map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("workspace root not found: {}", workspace_root.display()),
        ))
    })
}

fn cache_rows<'a>(
    cache: &'a FileCache,
    paths: &[PathBuf],
) -> Vec<(&'a FileCacheEntry, &'a FileAnalysis)> {
    paths
        .iter()
        .filter_map(|p| Some((cache.entry(p)?, cache.analysis(p)?)))
        .collect()
}

fn cache_entry(file: &ExtractedFile, analysis: &FileAnalysis, now: DateTime<Utc>) -> FileCacheEntry {
    FileCacheEntry::new(file.relative_path.clone(), file.stamp, analysis, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_workspace() -> TempDir {
        tempfile::tempdir().expect("failed to create temp dir")
    }

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    #[test]
    fn new_creates_database_under_state_dir() {
        let workspace = temp_workspace();
        let analyzer = Analyzer::new(workspace.path()).unwrap();

        let root = workspace.path().canonicalize().unwrap();
        assert_eq!(analyzer.db_path(), root.join(".depcycle/cache.db"));
    }

    #[test]
    fn new_fails_for_nonexistent_workspace() {
        let result = Analyzer::new(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn discovery_skips_hidden_and_excluded_directories() {
        let workspace = temp_workspace();
        write(&workspace, "Assets/Scripts/Player.cs", "class Player {}");
        write(&workspace, "Assets/Notes.txt", "not code");
        write(&workspace, "Library/Cache.cs", "class Cached {}");
        write(&workspace, ".hidden/Secret.cs", "class Secret {}");
        write(&workspace, "obj/Gen.cs", "class Gen {}");

        let analyzer = Analyzer::new(workspace.path()).unwrap();
        let files = analyzer.discover_files().unwrap();

        assert_eq!(files, vec![PathBuf::from("Assets/Scripts/Player.cs")]);
    }

    #[test]
    fn absolute_paths_are_made_relative() {
        let workspace = temp_workspace();
        let analyzer = Analyzer::new(workspace.path()).unwrap();

        let inside = analyzer.workspace_root().join("Assets/A.cs");
        assert_eq!(analyzer.relative_path(&inside), Some(PathBuf::from("Assets/A.cs")));
        assert_eq!(analyzer.relative_path(Path::new("B.cs")), Some(PathBuf::from("B.cs")));
    }

    #[rstest::rstest]
    #[case("./B.cs", "B.cs")]
    #[case("Assets/./A.cs", "Assets/A.cs")]
    #[case("./Assets/Scripts/A.cs", "Assets/Scripts/A.cs")]
    fn current_dir_components_are_dropped(#[case] given: &str, #[case] expected: &str) {
        let workspace = temp_workspace();
        let analyzer = Analyzer::new(workspace.path()).unwrap();

        assert_eq!(analyzer.relative_path(Path::new(given)), Some(PathBuf::from(expected)));
        let absolute = analyzer.workspace_root().join(given);
        assert_eq!(analyzer.relative_path(&absolute), Some(PathBuf::from(expected)));
    }

    #[test]
    fn dotted_change_paths_hit_the_cached_entry() {
        let workspace = temp_workspace();
        write(&workspace, "a.cs", "namespace X { class A {} }");
        let mut analyzer = Analyzer::new(workspace.path()).unwrap();
        analyzer.run_full_analysis().unwrap();

        write(&workspace, "a.cs", "namespace Z { class A {} }");
        let update = analyzer.parse_changed_file(Path::new("./a.cs")).unwrap();

        assert!(update.affected[&AnalysisLevel::Namespace].contains("X"));
        assert_eq!(update.analysis.namespace, "Z");
    }

    #[test]
    fn failed_commit_keeps_previous_state() {
        let workspace = temp_workspace();
        write(&workspace, "a.cs", "namespace X { class A {} }");
        let mut analyzer = Analyzer::new(workspace.path()).unwrap();
        analyzer.run_full_analysis().unwrap();
        let stored = analyzer.store.load_files().unwrap();
        analyzer
            .store
            .connection()
            .unwrap()
            .execute_batch("DROP TABLE known_cycles")
            .unwrap();

        write(&workspace, "a.cs", "namespace Z { class A {} }");
        write(&workspace, "b.cs", "namespace Y { class B {} }");
        assert!(analyzer.run_full_analysis().is_err());

        assert_eq!(analyzer.store.load_files().unwrap(), stored);
        assert_eq!(analyzer.cache.len(), 1);
        let namespaces = analyzer.graphs().level(AnalysisLevel::Namespace);
        assert!(namespaces.contains("X"));
        assert!(!namespaces.contains("Z"));
    }

    #[test]
    fn parse_changed_file_reports_old_and_new_nodes() {
        let workspace = temp_workspace();
        write(&workspace, "a.cs", "namespace X { class A {} }");
        let mut analyzer = Analyzer::new(workspace.path()).unwrap();
        analyzer.run_full_analysis().unwrap();

        write(&workspace, "a.cs", "namespace Z { class A {} }");
        let update = analyzer.parse_changed_file(Path::new("a.cs")).unwrap();

        let namespaces = &update.affected[&AnalysisLevel::Namespace];
        assert!(namespaces.contains("X"));
        assert!(namespaces.contains("Z"));
        assert!(update.affected[&AnalysisLevel::Class].contains("X.A"));
        assert!(update.affected[&AnalysisLevel::Class].contains("Z.A"));
        assert_eq!(update.analysis.namespace, "Z");
        // Nothing was applied.
        assert!(analyzer.graphs().level(AnalysisLevel::Namespace).contains("X"));
    }

    #[test]
    fn dropped_prepared_run_changes_nothing() {
        let workspace = temp_workspace();
        write(&workspace, "x.cs", "namespace X { using Y; class A { B b; } }");
        write(&workspace, "y.cs", "namespace Y { using X; class B { A a; } }");
        let mut analyzer = Analyzer::new(workspace.path()).unwrap();
        analyzer.run_full_analysis().unwrap();
        let known_before: Vec<_> = analyzer.known_cycles().cloned().collect();

        std::fs::remove_file(workspace.path().join("y.cs")).unwrap();
        let run = analyzer.prepare_incremental(&[PathBuf::from("y.cs")]);
        assert_eq!(run.mode(), AnalysisMode::Incremental);
        drop(run);

        assert!(analyzer.cache().contains(Path::new("y.cs")));
        let known_after: Vec<_> = analyzer.known_cycles().cloned().collect();
        assert_eq!(known_before, known_after);
    }
}
