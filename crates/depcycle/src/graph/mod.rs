//! Level-scoped dependency graphs.
//!
//! Each [`AnalysisLevel`] has its own [`LevelGraph`]: a map from full name to
//! [`DependencyNode`]. Nodes are never edited in place. A node is rebuilt from
//! the per-file [`NodeContribution`]s that mention its key and then applied
//! wholesale, or removed when nothing contributes to it any more.
//!
//! ## Snapshots
//!
//! [`DependencyGraphs`] keeps the three levels behind `Arc`. Cloning is cheap
//! and patching goes through `Arc::make_mut`, so a result that was already
//! published keeps seeing the graph it was built from.
//!
//! Targets are not validated: an edge to a name without a node is a dangling
//! edge and is kept as-is.

mod builder;

pub use builder::{
    ContributedEdge, FileAnalysis, FileUpdate, IndexedType, NodeContribution, NodeKey,
    TypeIndex, TypeSummary, analyze_file,
};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{AnalysisLevel, DependencyNode};

/// Nodes of one level, keyed and iterated by full name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelGraph {
    nodes: BTreeMap<String, DependencyNode>,
}

impl LevelGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node`, replacing any node with the same full name.
    pub fn apply(&mut self, node: DependencyNode) {
        self.nodes.insert(node.full_name.clone(), node);
    }

    /// Remove the node keyed `full_name`.
    pub fn remove(&mut self, full_name: &str) -> Option<DependencyNode> {
        self.nodes.remove(full_name)
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, full_name: &str) -> Option<&DependencyNode> {
        self.nodes.get(full_name)
    }

    /// Whether a node with this full name exists.
    #[must_use]
    pub fn contains(&self, full_name: &str) -> bool {
        self.nodes.contains_key(full_name)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.values()
    }

    /// Full names in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Total number of edges, dangling ones included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.dependencies.len()).sum()
    }

    /// Number of edges whose target has no node.
    #[must_use]
    pub fn dangling_edge_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|n| n.dependencies.iter())
            .filter(|target| !self.nodes.contains_key(target.as_str()))
            .count()
    }
}

/// The namespace, class, and system graphs of one analysis state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraphs {
    namespace: Arc<LevelGraph>,
    class: Arc<LevelGraph>,
    system: Arc<LevelGraph>,
}

impl DependencyGraphs {
    /// Create three empty graphs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build all three graphs from per-file analyses.
    ///
    /// `analyses` must be ordered by path; contributions to the same node
    /// are merged in that order.
    pub fn from_analyses<'a>(
        analyses: impl IntoIterator<Item = (&'a Path, &'a FileAnalysis)>,
    ) -> Self {
        let mut grouped: BTreeMap<NodeKey, Vec<(&Path, &NodeContribution)>> = BTreeMap::new();
        for (path, analysis) in analyses {
            for contribution in &analysis.contributions {
                grouped
                    .entry(contribution.key())
                    .or_default()
                    .push((path, contribution));
            }
        }

        let mut graphs = Self::new();
        for ((level, _), contributions) in grouped {
            if let Some(node) = merge_contributions(&contributions) {
                graphs.level_mut(level).apply(node);
            }
        }
        graphs
    }

    /// Graph for `level`.
    #[must_use]
    pub fn level(&self, level: AnalysisLevel) -> &LevelGraph {
        match level {
            AnalysisLevel::Namespace => &self.namespace,
            AnalysisLevel::Class => &self.class,
            AnalysisLevel::System => &self.system,
        }
    }

    /// Mutable graph for `level`, cloned first if a snapshot shares it.
    pub fn level_mut(&mut self, level: AnalysisLevel) -> &mut LevelGraph {
        match level {
            AnalysisLevel::Namespace => Arc::make_mut(&mut self.namespace),
            AnalysisLevel::Class => Arc::make_mut(&mut self.class),
            AnalysisLevel::System => Arc::make_mut(&mut self.system),
        }
    }

    /// Rebuild the node at `key` from its remaining contributions.
    ///
    /// With no contributions the node is removed.
    pub fn patch(&mut self, key: &NodeKey, contributions: &[(&Path, &NodeContribution)]) {
        let (level, full_name) = key;
        match merge_contributions(contributions) {
            Some(node) => self.level_mut(*level).apply(node),
            None => {
                self.level_mut(*level).remove(full_name);
            }
        }
    }

    /// Total node count across levels.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.namespace.len() + self.class.len() + self.system.len()
    }
}

/// Merge contributions to one node, in the given (path) order.
///
/// The first contribution supplies name, namespace and file path. Edges are
/// added in order, so targets keep their first-observed order and each edge
/// keeps the strongest kind seen.
#[must_use]
pub fn merge_contributions(contributions: &[(&Path, &NodeContribution)]) -> Option<DependencyNode> {
    let (first_path, first) = contributions.first()?;
    let mut node = DependencyNode::new(
        first.name.clone(),
        first.namespace.clone(),
        first.full_name.clone(),
        first_path.to_path_buf(),
    );

    for (path, contribution) in contributions {
        for edge in &contribution.edges {
            node.add_dependency(
                &edge.target,
                edge.kind,
                format!("{} ({}:{})", edge.kind.label(), path.display(), edge.line),
                edge.line,
                path,
            );
        }
    }

    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DependencyKind;

    fn contribution(full_name: &str, targets: &[(&str, DependencyKind, u32)]) -> NodeContribution {
        NodeContribution {
            level: AnalysisLevel::Namespace,
            name: full_name.to_string(),
            namespace: full_name.to_string(),
            full_name: full_name.to_string(),
            edges: targets
                .iter()
                .map(|(target, kind, line)| ContributedEdge {
                    target: (*target).to_string(),
                    kind: *kind,
                    line: *line,
                })
                .collect(),
        }
    }

    #[test]
    fn apply_replaces_and_remove_deletes() {
        let mut graph = LevelGraph::new();
        let mut node = DependencyNode::new("A", "G", "G.A", "a.cs".into());
        graph.apply(node.clone());
        node.dependencies.push("G.B".to_string());
        graph.apply(node);

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("G.A").unwrap().dependencies, vec!["G.B".to_string()]);
        assert_eq!(graph.dangling_edge_count(), 1);

        assert!(graph.remove("G.A").is_some());
        assert!(graph.is_empty());
    }

    #[test]
    fn merge_orders_edges_by_contribution_order() {
        let a = contribution("X", &[("Y", DependencyKind::Import, 1)]);
        let b = contribution(
            "X",
            &[("Z", DependencyKind::Import, 2), ("Y", DependencyKind::QualifiedReference, 9)],
        );

        let node = merge_contributions(&[(Path::new("a.cs"), &a), (Path::new("b.cs"), &b)]).unwrap();

        assert_eq!(node.file_path, Path::new("a.cs"));
        assert_eq!(node.dependencies, vec!["Y".to_string(), "Z".to_string()]);
        let y = node.detail_for("Y").unwrap();
        assert_eq!(y.kind, DependencyKind::Import);
        assert_eq!(y.line_numbers, vec![1, 9]);
        assert_eq!(y.reasons[0], "using directive (a.cs:1)");
    }

    #[test]
    fn merge_of_nothing_is_none() {
        assert!(merge_contributions(&[]).is_none());
    }

    #[test]
    fn patching_does_not_touch_published_snapshots() {
        let x = contribution("X", &[("Y", DependencyKind::Import, 1)]);
        let mut graphs = DependencyGraphs::new();
        graphs.patch(&(AnalysisLevel::Namespace, "X".to_string()), &[(Path::new("a.cs"), &x)]);

        let snapshot = graphs.clone();
        graphs.patch(&(AnalysisLevel::Namespace, "X".to_string()), &[]);

        assert!(snapshot.level(AnalysisLevel::Namespace).contains("X"));
        assert!(!graphs.level(AnalysisLevel::Namespace).contains("X"));
    }
}
