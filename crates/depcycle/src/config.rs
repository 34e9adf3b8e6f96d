//! Analyzer configuration.
//!
//! `AnalyzerConfig` is an explicit value handed to each component when it is
//! constructed. Nothing reads configuration from a global. The CLI loads it
//! from `<root>/.depcycle/config.yaml` when that file exists and falls back
//! to [`AnalyzerConfig::default`] otherwise.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::AnalysisLevel;

/// Directory (relative to the workspace root) holding depcycle state.
pub const STATE_DIR_NAME: &str = ".depcycle";

/// Config file name inside [`STATE_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Cache database file name inside [`STATE_DIR_NAME`].
pub const CACHE_DB_NAME: &str = "cache.db";

/// Configuration for the whole analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AnalyzerConfig {
    /// Source file extensions to analyze (without the dot).
    pub extensions: Vec<String>,

    /// Directory names that are never descended into.
    pub excluded_dirs: Vec<String>,

    /// Namespace prefixes that never produce namespace-level edges.
    ///
    /// Matching is segment-aware: `System` filters `System` and
    /// `System.Collections` but not `Systems.Combat`.
    pub ignored_namespace_prefixes: Vec<String>,

    /// Namespace assigned to files without a namespace declaration. Types in
    /// this namespace are visible from every file.
    pub default_namespace: String,

    /// Maximum changed/total ratio for which incremental patching is used.
    pub incremental_threshold: f64,

    /// Levels whose cycles are detected and reported.
    pub levels: Vec<AnalysisLevel>,

    /// Rules for recognizing "system" types.
    pub system: SystemRules,
}

/// Rules for recognizing ECS-style system types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SystemRules {
    /// A type whose name contains this marker is a system.
    pub name_marker: String,
    /// A type whose base list names one of these is a system.
    pub base_markers: Vec<String>,
    /// Types whose names end with one of these are never systems.
    pub excluded_suffixes: Vec<String>,
}

impl Default for SystemRules {
    fn default() -> Self {
        Self {
            name_marker: "System".to_string(),
            base_markers: vec!["ISystem".to_string(), "SystemBase".to_string()],
            excluded_suffixes: vec![
                "Authoring".to_string(),
                "Baker".to_string(),
                "Data".to_string(),
            ],
        }
    }
}

impl SystemRules {
    /// Whether a type with this name and base list is a system.
    #[must_use]
    pub fn is_system(&self, name: &str, bases: &[String]) -> bool {
        if self.excluded_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }
        let named = !self.name_marker.is_empty() && name.contains(self.name_marker.as_str());
        named
            || bases.iter().any(|base| {
                let short = base.rsplit('.').next().unwrap_or(base);
                self.base_markers.iter().any(|m| m == short)
            })
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["cs".to_string()],
            excluded_dirs: [
                "bin", "obj", "build", "dist", "target", "node_modules", "Library", "Temp",
                "Packages",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            ignored_namespace_prefixes: [
                "System",
                "Unity",
                "UnityEngine",
                "UnityEditor",
                "Microsoft",
                "TMPro",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            default_namespace: "Global".to_string(),
            incremental_threshold: 0.1,
            levels: AnalysisLevel::ALL.to_vec(),
            system: SystemRules::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from a YAML file.
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<root>/.depcycle/config.yaml` if present, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_or_default(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join(STATE_DIR_NAME).join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the threshold is outside `0.0..=1.0`,
    /// no extension is configured, or the default namespace is empty.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.incremental_threshold) {
            return Err(Error::Config(format!(
                "incremental-threshold must be between 0 and 1, got {}",
                self.incremental_threshold
            )));
        }
        if self.extensions.is_empty() {
            return Err(Error::Config(
                "at least one source extension is required".to_string(),
            ));
        }
        if self.default_namespace.trim().is_empty() {
            return Err(Error::Config("default-namespace must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether namespace-level edges to `namespace` are suppressed.
    #[must_use]
    pub fn is_ignored_namespace(&self, namespace: &str) -> bool {
        self.ignored_namespace_prefixes.iter().any(|prefix| {
            namespace == prefix
                || namespace
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Whether a path has one of the configured source extensions.
    #[must_use]
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }

    /// Whether a directory name is excluded from discovery.
    #[must_use]
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        name.starts_with('.') || self.excluded_dirs.iter().any(|d| d == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("System", true)]
    #[case("System.Collections.Generic", true)]
    #[case("UnityEngine.UI", true)]
    #[case("Systems.Combat", false)]
    #[case("Game.System", false)]
    #[case("Game.Core", false)]
    fn ignored_namespaces_are_segment_aware(#[case] namespace: &str, #[case] ignored: bool) {
        let config = AnalyzerConfig::default();
        assert_eq!(config.is_ignored_namespace(namespace), ignored);
    }

    #[test]
    fn load_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "default-namespace: Root\nincremental-threshold: 0.25\n").unwrap();

        let config = AnalyzerConfig::load(&path).unwrap();

        assert_eq!(config.default_namespace, "Root");
        assert!((config.incremental_threshold - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.extensions, vec!["cs".to_string()]);
        assert_eq!(config.levels, AnalysisLevel::ALL.to_vec());
    }

    #[test]
    fn load_rejects_out_of_range_threshold() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "incremental-threshold: 1.5\n").unwrap();

        let result = AnalyzerConfig::load(&path);

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_or_default_without_file_returns_defaults() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = AnalyzerConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[rstest]
    #[case("MovementSystem", &[], true)]
    #[case("Mover", &["ISystem"], true)]
    #[case("Mover", &["Unity.Entities.SystemBase"], true)]
    #[case("SpawnerSystemAuthoring", &[], false)]
    #[case("HealthSystemData", &["ISystem"], false)]
    #[case("Player", &["MonoBehaviour"], false)]
    fn system_rules_classify_types(
        #[case] name: &str,
        #[case] bases: &[&str],
        #[case] expected: bool,
    ) {
        let bases: Vec<String> = bases.iter().map(ToString::to_string).collect();
        assert_eq!(SystemRules::default().is_system(name, &bases), expected);
    }

    #[test]
    fn source_file_extension_match_is_case_insensitive() {
        let config = AnalyzerConfig::default();
        assert!(config.is_source_file(Path::new("Scripts/Player.cs")));
        assert!(config.is_source_file(Path::new("Scripts/Player.CS")));
        assert!(!config.is_source_file(Path::new("Scripts/Player.rs")));
    }
}
