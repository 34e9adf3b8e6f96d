//! Per-file node contributions.
//!
//! Turning [`FileFacts`] into graph input happens in two steps:
//!
//! 1. [`TypeSummary`]s are taken from every file's facts (or from the cached
//!    analysis of files that did not change) and collected into a
//!    [`TypeIndex`].
//! 2. [`analyze_file`] scans each type scope against the index and emits one
//!    [`NodeContribution`] per node key the file touches.
//!
//! A file's contributions depend only on its own text and on the index, so
//! recomputing them for a file always gives the same answer as a full run
//! with the same index.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::AnalyzerConfig;
use crate::extract::patterns::{self, CandidateMatch, PatternRule};
use crate::extract::{DeclaredType, FileFacts};
use crate::types::{AnalysisLevel, DependencyKind};

/// Identifies a node across levels.
pub type NodeKey = (AnalysisLevel, String);

/// One observed edge inside a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributedEdge {
    /// Target full name
    pub target: String,
    /// Strongest kind matched on the line
    pub kind: DependencyKind,
    /// 1-indexed line
    pub line: u32,
}

/// One file's share of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContribution {
    /// Level of the node
    pub level: AnalysisLevel,
    /// Short name
    pub name: String,
    /// Namespace of the node
    pub namespace: String,
    /// Node key within the level
    pub full_name: String,
    /// Edges in line order
    pub edges: Vec<ContributedEdge>,
}

impl NodeContribution {
    /// Key of the node this contributes to.
    #[must_use]
    pub fn key(&self) -> NodeKey {
        (self.level, self.full_name.clone())
    }
}

/// A declared top-level type, as needed by other files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSummary {
    /// Short name
    pub name: String,
    /// Namespace of the declaring file
    pub namespace: String,
    /// `namespace.name`
    pub full_name: String,
    /// Whether the type is an ECS system
    pub is_system: bool,
}

impl TypeSummary {
    /// Summaries of every top-level type in `facts`.
    #[must_use]
    pub fn from_facts(facts: &FileFacts) -> Vec<Self> {
        facts
            .types
            .iter()
            .map(|t| Self {
                name: t.name.clone(),
                namespace: facts.namespace.clone(),
                full_name: full_name(&facts.namespace, &t.name),
                is_system: t.is_system,
            })
            .collect()
    }
}

/// Everything the rest of the pipeline keeps about one analyzed file.
///
/// Persisted as JSON so a restarted analyzer can patch incrementally
/// without re-reading unchanged files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Declared (or default) namespace
    pub namespace: String,
    /// Top-level types
    pub types: Vec<TypeSummary>,
    /// Names the file depends on, used for dependent propagation
    pub recorded_names: BTreeSet<String>,
    /// Contributions to all three levels
    pub contributions: Vec<NodeContribution>,
}

impl FileAnalysis {
    /// Short names of the file's top-level types.
    #[must_use]
    pub fn declared_names(&self) -> BTreeSet<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    /// Keys of every node this file contributes to.
    #[must_use]
    pub fn keys(&self) -> BTreeSet<NodeKey> {
        self.contributions.iter().map(NodeContribution::key).collect()
    }
}

/// Result of re-parsing one file: its new analysis plus every node it
/// touched before or after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    /// The file
    pub path: PathBuf,
    /// New analysis
    pub analysis: FileAnalysis,
    /// Per level, node keys contributed to by the old or the new analysis
    pub affected: BTreeMap<AnalysisLevel, BTreeSet<String>>,
}

impl FileUpdate {
    /// Combine an old analysis (if any) with the new one.
    #[must_use]
    pub fn new(path: PathBuf, previous: Option<&FileAnalysis>, analysis: FileAnalysis) -> Self {
        let mut affected: BTreeMap<AnalysisLevel, BTreeSet<String>> = BTreeMap::new();
        for (level, name) in previous
            .into_iter()
            .flat_map(FileAnalysis::keys)
            .chain(analysis.keys())
        {
            affected.entry(level).or_default().insert(name);
        }
        Self {
            path,
            analysis,
            affected,
        }
    }
}

/// A type known to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedType {
    /// Namespace of the type
    pub namespace: String,
    /// Node key at the class level
    pub full_name: String,
    /// Whether any declaration marks it as a system
    pub is_system: bool,
    /// Files declaring it (several for partial types)
    pub files: BTreeSet<PathBuf>,
}

/// Short type name → every top-level type with that name.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    by_name: BTreeMap<String, Vec<IndexedType>>,
}

impl TypeIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the types declared by `path`.
    pub fn insert(&mut self, path: &Path, types: &[TypeSummary]) {
        for summary in types {
            let entries = self.by_name.entry(summary.name.clone()).or_default();
            match entries.iter_mut().find(|e| e.full_name == summary.full_name) {
                Some(existing) => {
                    existing.is_system |= summary.is_system;
                    existing.files.insert(path.to_path_buf());
                }
                None => {
                    entries.push(IndexedType {
                        namespace: summary.namespace.clone(),
                        full_name: summary.full_name.clone(),
                        is_system: summary.is_system,
                        files: BTreeSet::from([path.to_path_buf()]),
                    });
                    entries.sort_by(|a, b| a.full_name.cmp(&b.full_name));
                }
            }
        }
    }

    /// Types named `name`, ordered by full name.
    #[must_use]
    pub fn candidates(&self, name: &str) -> &[IndexedType] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct short names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether no type is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Every system type, ordered by full name.
    #[must_use]
    pub fn systems(&self) -> Vec<&IndexedType> {
        let mut systems: Vec<_> = self
            .by_name
            .values()
            .flatten()
            .filter(|t| t.is_system)
            .collect();
        systems.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        systems
    }
}

/// Compute a file's contributions to all three levels.
#[must_use]
pub fn analyze_file(facts: &FileFacts, index: &TypeIndex, config: &AnalyzerConfig) -> FileAnalysis {
    let mut contributions = vec![namespace_contribution(facts, config)];

    for declared in &facts.types {
        contributions.push(type_contribution(
            facts,
            declared,
            index,
            config,
            AnalysisLevel::Class,
        ));
    }
    for declared in facts.types.iter().filter(|t| t.is_system) {
        contributions.push(type_contribution(
            facts,
            declared,
            index,
            config,
            AnalysisLevel::System,
        ));
    }

    FileAnalysis {
        namespace: facts.namespace.clone(),
        types: TypeSummary::from_facts(facts),
        recorded_names: facts.recorded_names(),
        contributions,
    }
}

fn namespace_contribution(facts: &FileFacts, config: &AnalyzerConfig) -> NodeContribution {
    let keep = |namespace: &str| {
        namespace != facts.namespace && !config.is_ignored_namespace(namespace)
    };

    let mut edges: Vec<ContributedEdge> = facts
        .imports
        .iter()
        .filter(|i| keep(&i.namespace))
        .map(|i| ContributedEdge {
            target: i.namespace.clone(),
            kind: DependencyKind::Import,
            line: i.line,
        })
        .chain(
            facts
                .qualified_refs
                .iter()
                .filter(|q| keep(&q.namespace))
                .map(|q| ContributedEdge {
                    target: q.namespace.clone(),
                    kind: DependencyKind::QualifiedReference,
                    line: q.line,
                }),
        )
        .collect();
    edges.sort_by_key(|e| e.line);

    NodeContribution {
        level: AnalysisLevel::Namespace,
        name: facts.namespace.clone(),
        namespace: facts.namespace.clone(),
        full_name: facts.namespace.clone(),
        edges,
    }
}

fn type_contribution(
    facts: &FileFacts,
    declared: &DeclaredType,
    index: &TypeIndex,
    config: &AnalyzerConfig,
    level: AnalysisLevel,
) -> NodeContribution {
    let (rules, systems_only): (&[PatternRule], bool) = match level {
        AnalysisLevel::System => (patterns::SYSTEM_RULES, true),
        _ => (patterns::CLASS_RULES, false),
    };
    let self_name = full_name(&facts.namespace, &declared.name);

    let header_end = header_end_line(declared);

    let mut edges = Vec::new();
    for line in &declared.scope {
        let in_header = (declared.line..=header_end).contains(&line.number);
        for mut candidate in patterns::match_line(rules, &line.text) {
            // Base lists may wrap onto later header lines.
            if level == AnalysisLevel::Class && in_header {
                if let Some(kind) = patterns::base_kind(&declared.bases, &candidate.name) {
                    if kind.priority() > candidate.kind.priority() {
                        candidate.kind = kind;
                    }
                }
            }
            for target in index.candidates(&candidate.name) {
                if target.full_name == self_name || (systems_only && !target.is_system) {
                    continue;
                }
                if !is_visible(facts, &candidate, target, config) {
                    continue;
                }
                // Co-located types only count through a structural use.
                if level == AnalysisLevel::Class
                    && target.files.contains(&facts.path)
                    && matches!(
                        candidate.kind,
                        DependencyKind::BareReference | DependencyKind::VariableReference
                    )
                {
                    continue;
                }
                edges.push(ContributedEdge {
                    target: target.full_name.clone(),
                    kind: candidate.kind,
                    line: line.number,
                });
            }
        }
    }

    NodeContribution {
        level,
        name: declared.name.clone(),
        namespace: facts.namespace.clone(),
        full_name: self_name,
        edges,
    }
}

/// Last line of the declaration header: the first line at or after the
/// keyword that opens the body.
fn header_end_line(declared: &DeclaredType) -> u32 {
    declared
        .scope
        .iter()
        .filter(|line| line.number >= declared.line)
        .find(|line| {
            // On the keyword line, braces before the type name belong to an
            // enclosing namespace.
            let text = if line.number == declared.line {
                line.text
                    .find(declared.name.as_str())
                    .map_or(line.text.as_str(), |at| &line.text[at..])
            } else {
                line.text.as_str()
            };
            text.contains(['{', ';'])
        })
        .map_or(declared.line, |line| line.number)
}

fn is_visible(
    facts: &FileFacts,
    candidate: &CandidateMatch,
    target: &IndexedType,
    config: &AnalyzerConfig,
) -> bool {
    if let Some(qualifier) = &candidate.qualifier {
        if target.namespace == *qualifier
            || target
                .namespace
                .strip_suffix(qualifier.as_str())
                .is_some_and(|head| head.ends_with('.'))
        {
            return true;
        }
    }
    facts.can_see(&target.namespace, &config.default_namespace)
}

fn full_name(namespace: &str, name: &str) -> String {
    format!("{namespace}.{name}")
}
