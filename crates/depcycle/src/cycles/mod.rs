//! Cycle detection, identity, and reporting.
//!
//! - [`find_cycles`]: representative simple cycles of one level graph
//! - [`cycle_id`]: rotation-invariant identity
//! - [`CycleTracker`]: new/persisting/resolved classification across runs
//! - [`cycle_edges`], [`cycle_stats`], [`suggest_fixes`]: derived reports

mod detect;
mod identity;
mod report;
mod tracker;

pub use detect::find_cycles;
pub use identity::{CYCLE_ID_LENGTH, cycle_id};
pub use report::{cycle_edges, cycle_stats, suggest_fixes, weakest_edge};
pub use tracker::{CycleDiff, CycleTracker, KnownCycle};

use chrono::{DateTime, Utc};

use crate::graph::DependencyGraphs;
use crate::types::AnalysisLevel;

/// Detect and classify cycles on each of `levels`.
///
/// Pure with respect to `tracker`: nothing is committed.
#[must_use]
pub fn diff_levels(
    tracker: &CycleTracker,
    graphs: &DependencyGraphs,
    levels: &[AnalysisLevel],
    now: DateTime<Utc>,
) -> CycleDiff {
    let mut combined = CycleDiff::default();
    for level in levels {
        let graph = graphs.level(*level);
        let detected = find_cycles(graph);
        tracing::debug!(level = %level, nodes = graph.len(), cycles = detected.len(), "Detected cycles");

        let diff = tracker.diff(*level, detected, graph, now);
        combined.cycles.extend(diff.cycles);
        combined.resolved.extend(diff.resolved);
    }
    combined
}
