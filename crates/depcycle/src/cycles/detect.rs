//! Representative cycle search over one level graph.
//!
//! # Design
//!
//! - **DFS per root**: roots are tried in key order; a global visited set
//!   means each node starts at most one traversal.
//! - **One cycle per root**: the first edge back into the current path ends
//!   that root's traversal. The cycle is the path suffix starting at the
//!   revisited node. Other cycles through the same nodes are not enumerated.
//! - **Iterative**: an explicit frame stack replaces recursion, so deep graphs
//!   cannot overflow the call stack and every edge is followed at most once.
//! - **Dangling edges**: targets without a node are skipped.

use std::collections::HashSet;

use crate::graph::LevelGraph;

/// Find representative simple cycles in `graph`.
///
/// Each cycle is listed in dependency order without repeating the first
/// member at the end. A node that depends on itself yields a one-member
/// cycle.
///
/// # Complexity
///
/// O(V+E): every node is pushed at most once and every edge followed at
/// most once.
#[must_use]
pub fn find_cycles(graph: &LevelGraph) -> Vec<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();

    for root in graph.keys() {
        if visited.contains(root) {
            continue;
        }
        if let Some(cycle) = traverse(graph, root, &mut visited) {
            cycles.push(cycle);
        }
    }

    cycles
}

/// DFS from `root`, returning the first cycle closed by a back-edge.
fn traverse<'g>(
    graph: &'g LevelGraph,
    root: &'g str,
    visited: &mut HashSet<&'g str>,
) -> Option<Vec<String>> {
    // (node, index of the next dependency to follow)
    let mut frames: Vec<(&'g str, usize)> = vec![(root, 0)];
    let mut on_path: HashSet<&'g str> = HashSet::from([root]);
    visited.insert(root);

    while let Some(frame) = frames.last_mut() {
        let node = frame.0;
        let next = frame.1;
        frame.1 += 1;

        let dependencies = graph.get(node).map_or(&[][..], |n| n.dependencies.as_slice());
        let Some(target) = dependencies.get(next).map(String::as_str) else {
            frames.pop();
            on_path.remove(node);
            continue;
        };

        if !graph.contains(target) {
            continue;
        }

        if on_path.contains(target) {
            let start = frames.iter().position(|(n, _)| *n == target)?;
            return Some(frames[start..].iter().map(|(n, _)| (*n).to_string()).collect());
        }

        if visited.insert(target) {
            frames.push((target, 0));
            on_path.insert(target);
        }
    }

    None
}
