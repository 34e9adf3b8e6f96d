//! Domain types for depcycle.
//!
//! These types represent the core domain model:
//! - **Graph entities**: `DependencyNode`, `DependencyDetail` (one graph per `AnalysisLevel`)
//! - **Cycle entities**: `Cycle`, `CycleEdge`, `ResolvedCycle`
//! - **Derived reports**: `CycleStats`, `FixSuggestion`
//! - **Results**: `AnalysisResult` (published once per analysis run)
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Level | Enum not String | The three graphs are fixed; adding one is a code change |
//! | Edge strength | `DependencyKind` priority | Fix suggestions need a total order of coupling strength |
//! | Graph keys | `BTreeMap` | Deterministic traversal order makes runs reproducible |
//! | Timestamps | `chrono::DateTime<Utc>` | Serializable, persisted with known cycles |

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FileError;
use crate::graph::DependencyGraphs;

// ============================================================================
// Enums
// ============================================================================

/// Granularity of a dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisLevel {
    /// Namespace-to-namespace dependencies
    Namespace,
    /// Top-level type to top-level type dependencies
    Class,
    /// Dependencies between ECS-style system types
    System,
}

impl AnalysisLevel {
    /// All levels in reporting order.
    pub const ALL: [Self; 3] = [Self::Namespace, Self::Class, Self::System];

    /// Convert to storage string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Class => "class",
            Self::System => "system",
        }
    }

    /// Parse the storage string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "namespace" => Some(Self::Namespace),
            "class" => Some(Self::Class),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one name depends on another.
///
/// Variants are ordered by coupling strength. [`priority`](Self::priority)
/// gives the numeric rank used when several patterns match the same line and
/// when picking the weakest edge of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// `class A : B`
    Inheritance,
    /// `class A : Base, IB` (any base after the first)
    InterfaceImplementation,
    /// `private B field;`
    FieldDeclaration,
    /// `GetComponent<B>`, `RefRW<B>`, `GetOrCreateSystem<B>` and friends
    ComponentAccess,
    /// `List<B>`
    GenericParameter,
    /// `[UpdateBefore(typeof(B))]` / `[UpdateAfter(typeof(B))]`
    OrderingAttribute,
    /// `new B(...)`
    Instantiation,
    /// File-scope `using B;`
    Import,
    /// `typeof(B)`
    TypeofReference,
    /// `B.Member`
    StaticMemberAccess,
    /// `Ns.Sub.Type` anywhere in code
    QualifiedReference,
    /// `B x = ...;` on a non-declaration line
    VariableReference,
    /// Any other mention of `B`
    BareReference,
}

impl DependencyKind {
    /// Every kind, strongest first.
    pub const ALL: [Self; 13] = [
        Self::Inheritance,
        Self::InterfaceImplementation,
        Self::FieldDeclaration,
        Self::ComponentAccess,
        Self::GenericParameter,
        Self::OrderingAttribute,
        Self::Instantiation,
        Self::Import,
        Self::TypeofReference,
        Self::StaticMemberAccess,
        Self::QualifiedReference,
        Self::VariableReference,
        Self::BareReference,
    ];

    /// Numeric rank; higher means stronger coupling.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Inheritance => 70,
            Self::InterfaceImplementation => 60,
            Self::FieldDeclaration => 50,
            Self::ComponentAccess => 45,
            Self::GenericParameter => 40,
            Self::OrderingAttribute => 35,
            Self::Instantiation => 30,
            Self::Import => 28,
            Self::TypeofReference => 25,
            Self::StaticMemberAccess => 20,
            Self::QualifiedReference => 15,
            Self::VariableReference => 12,
            Self::BareReference => 10,
        }
    }

    /// Human-readable label used in reason strings.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Inheritance => "inheritance",
            Self::InterfaceImplementation => "interface implementation",
            Self::FieldDeclaration => "field declaration",
            Self::ComponentAccess => "component/system access",
            Self::GenericParameter => "generic type parameter",
            Self::OrderingAttribute => "update ordering attribute",
            Self::Instantiation => "object instantiation",
            Self::Import => "using directive",
            Self::TypeofReference => "typeof reference",
            Self::StaticMemberAccess => "static member access",
            Self::VariableReference => "variable/field reference",
            Self::QualifiedReference => "qualified reference",
            Self::BareReference => "general reference",
        }
    }

    /// Whether the dependency only mentions the target without structurally
    /// building on it. Such edges are the cheapest to break.
    #[must_use]
    pub fn is_reference_only(self) -> bool {
        self.priority() <= Self::TypeofReference.priority()
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether a run patched the graph or rebuilt it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Every file was re-extracted and the graphs rebuilt
    Full,
    /// Only changed files and their dependents were re-extracted
    Incremental,
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Incremental => f.write_str("incremental"),
        }
    }
}

// ============================================================================
// Graph entities
// ============================================================================

/// Why `from` depends on one particular target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDetail {
    /// Full name of the dependency target
    pub target: String,
    /// Reason strings, e.g. `"inheritance (Scripts/Player.cs:12)"`
    pub reasons: Vec<String>,
    /// Line numbers (1-indexed) where the dependency was observed
    pub line_numbers: Vec<u32>,
    /// Strongest kind observed for this edge
    pub kind: DependencyKind,
    /// File of the first observation
    pub file_path: PathBuf,
}

/// A node in one level's dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Short name (type name, or the namespace itself)
    pub name: String,
    /// Namespace the node lives in
    pub namespace: String,
    /// Unique key within its level
    pub full_name: String,
    /// First file (by path order) that contributes to this node
    pub file_path: PathBuf,
    /// Target full names in first-observed order, without duplicates
    pub dependencies: Vec<String>,
    /// One entry per target in `dependencies`, same order
    pub dependency_details: Vec<DependencyDetail>,
}

impl DependencyNode {
    /// Create a node without dependencies.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        full_name: impl Into<String>,
        file_path: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            full_name: full_name.into(),
            file_path,
            dependencies: Vec::new(),
            dependency_details: Vec::new(),
        }
    }

    /// Details recorded for `target`, if it is a dependency.
    #[must_use]
    pub fn detail_for(&self, target: &str) -> Option<&DependencyDetail> {
        self.dependency_details.iter().find(|d| d.target == target)
    }

    /// Record an observation of a dependency on `target`.
    ///
    /// Keeps `dependencies` and `dependency_details` aligned, de-duplicates
    /// reasons and line numbers, and upgrades the edge kind when a stronger
    /// pattern is seen.
    pub fn add_dependency(
        &mut self,
        target: &str,
        kind: DependencyKind,
        reason: String,
        line: u32,
        file_path: &std::path::Path,
    ) {
        if let Some(detail) = self.dependency_details.iter_mut().find(|d| d.target == target) {
            if !detail.reasons.contains(&reason) {
                detail.reasons.push(reason);
            }
            if !detail.line_numbers.contains(&line) {
                detail.line_numbers.push(line);
            }
            if kind.priority() > detail.kind.priority() {
                detail.kind = kind;
            }
            return;
        }

        self.dependencies.push(target.to_string());
        self.dependency_details.push(DependencyDetail {
            target: target.to_string(),
            reasons: vec![reason],
            line_numbers: vec![line],
            kind,
            file_path: file_path.to_path_buf(),
        });
    }
}

// ============================================================================
// Cycle entities
// ============================================================================

/// One edge of a detected cycle with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleEdge {
    /// Dependent member
    pub from: String,
    /// Dependency member
    pub to: String,
    /// Reasons copied from the originating node's details
    pub reasons: Vec<String>,
    /// Strongest kind observed for the edge, when details exist
    pub kind: Option<DependencyKind>,
    /// File where the edge was first observed
    pub file_path: Option<PathBuf>,
    /// First line where the edge was observed
    pub line_number: Option<u32>,
}

/// A circular dependency found on one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    /// Rotation-invariant identity (see [`crate::cycles::cycle_id`])
    pub id: String,
    /// Level the cycle was detected on
    pub level: AnalysisLevel,
    /// Members in dependency order; the loop closes from last back to first
    pub members: Vec<String>,
    /// `members[i] -> members[i + 1]` edges, including the closing edge
    pub edges: Vec<CycleEdge>,
    /// Whether the previous result did not contain this cycle
    pub is_new: bool,
    /// When the cycle was first discovered
    pub discovered_at: DateTime<Utc>,
}

impl Cycle {
    /// Number of members in the loop.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the cycle has no members (never produced by the detector).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Render as `A → B → A`.
    #[must_use]
    pub fn path_string(&self) -> String {
        let mut path = self.members.join(" → ");
        if let Some(first) = self.members.first() {
            path.push_str(" → ");
            path.push_str(first);
        }
        path
    }
}

/// A previously known cycle that is no longer present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCycle {
    /// Identity of the resolved cycle
    pub id: String,
    /// Level it was tracked on
    pub level: AnalysisLevel,
    /// Members as last seen
    pub members: Vec<String>,
}

// ============================================================================
// Derived reports
// ============================================================================

/// Aggregate metrics over a set of cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Number of cycles
    pub total: usize,
    /// Number of cycles flagged `is_new`
    pub new_count: usize,
    /// Distinct node names participating in any cycle
    pub distinct_nodes: usize,
    /// Mean cycle length (0.0 when there are no cycles)
    pub average_length: f64,
    /// Longest cycle length (0 when there are no cycles)
    pub max_length: usize,
    /// Cycle length → number of cycles with that length
    pub length_histogram: BTreeMap<usize, usize>,
}

/// Ranking of fix suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    /// Worth trying last
    Low,
    /// Reasonable alternative
    Medium,
    /// Most promising fix
    High,
}

/// Kind of refactoring proposed for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixKind {
    /// Remove the weakest edge
    BreakDependency,
    /// Point the weakest edge the other way through an abstraction
    InvertDependency,
    /// Merge the weakest edge's endpoints into one unit
    MergeNodes,
}

/// A proposed way to break a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSuggestion {
    /// What kind of refactoring
    pub kind: FixKind,
    /// How promising it is
    pub priority: SuggestionPriority,
    /// One-sentence description for display
    pub description: String,
    /// Dependent side of the targeted edge
    pub from: String,
    /// Dependency side of the targeted edge
    pub to: String,
    /// Files that would need to change
    pub files: BTreeSet<PathBuf>,
}

// ============================================================================
// Operation results
// ============================================================================

/// Everything one analysis run produced.
///
/// Published to collaborators as an immutable `Arc<AnalysisResult>` snapshot.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The three level graphs as of this run
    pub dependencies: DependencyGraphs,
    /// Cycles on every analyzed level
    pub circular_dependencies: Vec<Cycle>,
    /// Cycles present in the previous result but not in this one
    pub resolved: Vec<ResolvedCycle>,
    /// Levels whose cycles were detected
    pub analysis_levels: Vec<AnalysisLevel>,
    /// Full rebuild or incremental patch
    pub mode: AnalysisMode,
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Files that were re-extracted (changed, new, and propagated dependents)
    pub affected_files: Vec<PathBuf>,
    /// Files known to the cache after the run
    pub total_files: usize,
    /// Non-fatal per-file errors
    pub errors: Vec<FileError>,
    /// Wall time of the run
    pub duration: Duration,
}

impl AnalysisResult {
    /// Cycles detected on `level`.
    pub fn cycles_at(&self, level: AnalysisLevel) -> impl Iterator<Item = &Cycle> {
        self.circular_dependencies
            .iter()
            .filter(move |c| c.level == level)
    }

    /// Identities of all current cycles on `level`.
    #[must_use]
    pub fn cycle_ids(&self, level: AnalysisLevel) -> BTreeSet<String> {
        self.cycles_at(level).map(|c| c.id.clone()).collect()
    }

    /// Cycles that first appeared in this run.
    pub fn new_cycles(&self) -> impl Iterator<Item = &Cycle> {
        self.circular_dependencies.iter().filter(|c| c.is_new)
    }
}
