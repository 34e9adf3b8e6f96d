//! Derived cycle reports: edge details, statistics, and fix suggestions.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::LevelGraph;
use crate::types::{
    Cycle, CycleEdge, CycleStats, DependencyKind, FixKind, FixSuggestion, SuggestionPriority,
};

/// Edges `members[i] -> members[i + 1]`, closing with `last -> first`.
///
/// Evidence comes from the originating node's dependency details. An edge
/// whose node or detail is missing is still listed, without evidence.
#[must_use]
pub fn cycle_edges(members: &[String], graph: &LevelGraph) -> Vec<CycleEdge> {
    let mut edges = Vec::with_capacity(members.len());
    for (i, from) in members.iter().enumerate() {
        let to = &members[(i + 1) % members.len()];
        let detail = graph.get(from).and_then(|node| node.detail_for(to));
        edges.push(CycleEdge {
            from: from.clone(),
            to: to.clone(),
            reasons: detail.map(|d| d.reasons.clone()).unwrap_or_default(),
            kind: detail.map(|d| d.kind),
            file_path: detail.map(|d| d.file_path.clone()),
            line_number: detail.and_then(|d| d.line_numbers.first().copied()),
        });
    }
    edges
}

/// Aggregate metrics over `cycles`.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Cycle counts are far below 2^52
pub fn cycle_stats(cycles: &[Cycle]) -> CycleStats {
    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    let mut nodes: BTreeSet<(crate::types::AnalysisLevel, &str)> = BTreeSet::new();
    let mut total_length = 0usize;

    for cycle in cycles {
        *histogram.entry(cycle.len()).or_default() += 1;
        total_length += cycle.len();
        nodes.extend(cycle.members.iter().map(|m| (cycle.level, m.as_str())));
    }

    CycleStats {
        total: cycles.len(),
        new_count: cycles.iter().filter(|c| c.is_new).count(),
        distinct_nodes: nodes.len(),
        average_length: if cycles.is_empty() {
            0.0
        } else {
            total_length as f64 / cycles.len() as f64
        },
        max_length: cycles.iter().map(Cycle::len).max().unwrap_or(0),
        length_histogram: histogram,
    }
}

/// The edge with the lowest-priority kind; the first one in loop order on
/// ties. Edges without evidence rank as bare references.
#[must_use]
pub fn weakest_edge(cycle: &Cycle) -> Option<&CycleEdge> {
    cycle
        .edges
        .iter()
        .enumerate()
        .min_by_key(|(i, e)| (edge_kind(e).priority(), *i))
        .map(|(_, e)| e)
}

/// Ranked ways to break `cycle`.
///
/// All suggestions target the weakest edge. Removing it is ranked highest
/// when it is a reference-only dependency. Merging is skipped for a
/// self-dependency.
#[must_use]
pub fn suggest_fixes(cycle: &Cycle, graph: &LevelGraph) -> Vec<FixSuggestion> {
    let Some(edge) = weakest_edge(cycle) else {
        return Vec::new();
    };
    let kind = edge_kind(edge);

    let edge_files: BTreeSet<_> = edge.file_path.iter().cloned().collect();
    let endpoint_files: BTreeSet<_> = [&edge.from, &edge.to]
        .into_iter()
        .filter_map(|name| graph.get(name).map(|n| n.file_path.clone()))
        .chain(edge.file_path.iter().cloned())
        .collect();

    let mut suggestions = vec![
        FixSuggestion {
            kind: FixKind::BreakDependency,
            priority: if kind.is_reference_only() {
                SuggestionPriority::High
            } else {
                SuggestionPriority::Medium
            },
            description: format!(
                "Remove the {} from {} to {}",
                kind.label(),
                edge.from,
                edge.to
            ),
            from: edge.from.clone(),
            to: edge.to.clone(),
            files: edge_files,
        },
        FixSuggestion {
            kind: FixKind::InvertDependency,
            priority: SuggestionPriority::Medium,
            description: format!(
                "Have {} depend on an abstraction owned by {} instead of on {} directly",
                edge.from, edge.from, edge.to
            ),
            from: edge.from.clone(),
            to: edge.to.clone(),
            files: endpoint_files.clone(),
        },
    ];

    if edge.from != edge.to {
        suggestions.push(FixSuggestion {
            kind: FixKind::MergeNodes,
            priority: if cycle.len() == 2 {
                SuggestionPriority::Medium
            } else {
                SuggestionPriority::Low
            },
            description: format!("Merge {} and {} into one unit", edge.from, edge.to),
            from: edge.from.clone(),
            to: edge.to.clone(),
            files: endpoint_files,
        });
    }

    suggestions.sort_by(|a, b| b.priority.cmp(&a.priority));
    suggestions
}

fn edge_kind(edge: &CycleEdge) -> DependencyKind {
    edge.kind.unwrap_or(DependencyKind::BareReference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::cycle_id;
    use crate::types::{AnalysisLevel, DependencyNode};
    use chrono::Utc;
    use std::path::{Path, PathBuf};

    fn graph(edges: &[(&str, &str, DependencyKind, &str)]) -> LevelGraph {
        let mut graph = LevelGraph::new();
        for (from, to, kind, file) in edges {
            let mut node = graph
                .get(from)
                .cloned()
                .unwrap_or_else(|| DependencyNode::new(*from, "G", *from, PathBuf::from(file)));
            node.add_dependency(to, *kind, format!("{} ({file}:3)", kind.label()), 3, Path::new(file));
            graph.apply(node);
        }
        graph
    }

    fn cycle(members: &[&str], graph: &LevelGraph, is_new: bool) -> Cycle {
        let members: Vec<String> = members.iter().map(ToString::to_string).collect();
        Cycle {
            id: cycle_id(&members),
            level: AnalysisLevel::Class,
            edges: cycle_edges(&members, graph),
            members,
            is_new,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn edges_close_the_loop_and_carry_evidence() {
        let g = graph(&[
            ("A", "B", DependencyKind::FieldDeclaration, "a.cs"),
            ("B", "A", DependencyKind::TypeofReference, "b.cs"),
        ]);

        let edges = cycle_edges(&["A".to_string(), "B".to_string()], &g);

        assert_eq!(edges.len(), 2);
        assert_eq!((edges[1].from.as_str(), edges[1].to.as_str()), ("B", "A"));
        assert_eq!(edges[1].kind, Some(DependencyKind::TypeofReference));
        assert_eq!(edges[1].file_path.as_deref(), Some(Path::new("b.cs")));
        assert_eq!(edges[1].line_number, Some(3));
        assert_eq!(edges[0].reasons, vec!["field declaration (a.cs:3)".to_string()]);
    }

    #[test]
    fn stats_summarize_lengths() {
        let g = graph(&[
            ("A", "B", DependencyKind::BareReference, "a.cs"),
            ("B", "A", DependencyKind::BareReference, "b.cs"),
            ("C", "D", DependencyKind::BareReference, "c.cs"),
            ("D", "E", DependencyKind::BareReference, "d.cs"),
            ("E", "C", DependencyKind::BareReference, "e.cs"),
        ]);
        let cycles = vec![cycle(&["A", "B"], &g, true), cycle(&["C", "D", "E"], &g, false)];

        let stats = cycle_stats(&cycles);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.new_count, 1);
        assert_eq!(stats.distinct_nodes, 5);
        assert!((stats.average_length - 2.5).abs() < f64::EPSILON);
        assert_eq!(stats.max_length, 3);
        assert_eq!(stats.length_histogram, BTreeMap::from([(2, 1), (3, 1)]));
    }

    #[test]
    fn stats_of_nothing_are_zero() {
        let stats = cycle_stats(&[]);
        assert_eq!(stats.total, 0);
        assert!(stats.average_length.abs() < f64::EPSILON);
        assert_eq!(stats.max_length, 0);
    }

    #[test]
    fn weakest_edge_prefers_first_on_ties() {
        let g = graph(&[
            ("A", "B", DependencyKind::StaticMemberAccess, "a.cs"),
            ("B", "C", DependencyKind::Inheritance, "b.cs"),
            ("C", "A", DependencyKind::StaticMemberAccess, "c.cs"),
        ]);
        let c = cycle(&["A", "B", "C"], &g, true);

        let weakest = weakest_edge(&c).unwrap();
        assert_eq!((weakest.from.as_str(), weakest.to.as_str()), ("A", "B"));
    }

    #[test]
    fn reference_only_weakest_edge_ranks_break_first() {
        let g = graph(&[
            ("A", "B", DependencyKind::Inheritance, "a.cs"),
            ("B", "A", DependencyKind::TypeofReference, "b.cs"),
        ]);
        let c = cycle(&["A", "B"], &g, true);

        let fixes = suggest_fixes(&c, &g);

        assert_eq!(fixes.len(), 3);
        assert_eq!(fixes[0].kind, FixKind::BreakDependency);
        assert_eq!(fixes[0].priority, SuggestionPriority::High);
        assert_eq!((fixes[0].from.as_str(), fixes[0].to.as_str()), ("B", "A"));
        assert_eq!(fixes[0].files, BTreeSet::from([PathBuf::from("b.cs")]));
        let merge = fixes.iter().find(|f| f.kind == FixKind::MergeNodes).unwrap();
        assert_eq!(merge.priority, SuggestionPriority::Medium);
        assert_eq!(
            merge.files,
            BTreeSet::from([PathBuf::from("a.cs"), PathBuf::from("b.cs")])
        );
    }

    #[test]
    fn structural_weakest_edge_keeps_break_at_medium() {
        let g = graph(&[
            ("A", "B", DependencyKind::Inheritance, "a.cs"),
            ("B", "C", DependencyKind::FieldDeclaration, "b.cs"),
            ("C", "A", DependencyKind::Instantiation, "c.cs"),
        ]);
        let c = cycle(&["A", "B", "C"], &g, true);

        let fixes = suggest_fixes(&c, &g);

        assert!(fixes.iter().all(|f| f.priority <= SuggestionPriority::Medium));
        let merge = fixes.iter().find(|f| f.kind == FixKind::MergeNodes).unwrap();
        assert_eq!(merge.priority, SuggestionPriority::Low);
        assert_eq!(fixes.last().unwrap().kind, FixKind::MergeNodes);
    }

    #[test]
    fn self_dependency_gets_no_merge() {
        let g = graph(&[("A", "A", DependencyKind::BareReference, "a.cs")]);
        let c = cycle(&["A"], &g, true);

        let fixes = suggest_fixes(&c, &g);

        assert!(fixes.iter().all(|f| f.kind != FixKind::MergeNodes));
    }
}
