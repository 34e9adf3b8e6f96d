//! Cycle identity tracking across runs.
//!
//! The tracker remembers, per level, every cycle of the last committed run.
//! [`CycleTracker::diff`] compares a fresh detection against that memory
//! without changing it; [`CycleTracker::commit`] makes a result the new
//! baseline. A run that is thrown away before commit leaves no trace.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{cycle_edges, cycle_id};
use crate::graph::LevelGraph;
use crate::types::{AnalysisLevel, Cycle, ResolvedCycle};

/// A cycle remembered from a committed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownCycle {
    /// Cycle identity
    pub id: String,
    /// Level it was found on
    pub level: AnalysisLevel,
    /// Members as last detected
    pub members: Vec<String>,
    /// First time the cycle was seen
    pub discovered_at: DateTime<Utc>,
}

/// Outcome of comparing one level's detection with the known set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleDiff {
    /// Current cycles, flagged new or persisting
    pub cycles: Vec<Cycle>,
    /// Known cycles that are gone
    pub resolved: Vec<ResolvedCycle>,
}

/// Known cycles per level.
#[derive(Debug, Clone, Default)]
pub struct CycleTracker {
    known: BTreeMap<AnalysisLevel, BTreeMap<String, KnownCycle>>,
}

impl CycleTracker {
    /// Create a tracker with no history; every cycle will be new.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a tracker from persisted cycles.
    #[must_use]
    pub fn from_known(cycles: impl IntoIterator<Item = KnownCycle>) -> Self {
        let mut tracker = Self::new();
        for cycle in cycles {
            tracker
                .known
                .entry(cycle.level)
                .or_default()
                .insert(cycle.id.clone(), cycle);
        }
        tracker
    }

    /// Classify `detected` cycles on `level` against the known set.
    ///
    /// Ids not previously known are new; persisting cycles keep their first
    /// discovery time; known ids that are absent are resolved. Duplicate
    /// detections of the same member set are reported once.
    #[must_use]
    pub fn diff(
        &self,
        level: AnalysisLevel,
        detected: Vec<Vec<String>>,
        graph: &LevelGraph,
        now: DateTime<Utc>,
    ) -> CycleDiff {
        let known = self.known.get(&level);
        let mut seen = BTreeSet::new();
        let mut cycles = Vec::with_capacity(detected.len());

        for members in detected {
            let id = cycle_id(&members);
            if !seen.insert(id.clone()) {
                continue;
            }
            let previous = known.and_then(|k| k.get(&id));
            cycles.push(Cycle {
                edges: cycle_edges(&members, graph),
                is_new: previous.is_none(),
                discovered_at: previous.map_or(now, |p| p.discovered_at),
                id,
                level,
                members,
            });
        }

        let resolved = known
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|k| !seen.contains(&k.id))
            .map(|k| ResolvedCycle {
                id: k.id.clone(),
                level,
                members: k.members.clone(),
            })
            .collect();

        CycleDiff { cycles, resolved }
    }

    /// Make `cycles` the known set for each of `levels`.
    ///
    /// Levels not listed keep their history.
    pub fn commit(&mut self, levels: &[AnalysisLevel], cycles: &[Cycle]) {
        for level in levels {
            let entries = cycles
                .iter()
                .filter(|c| c.level == *level)
                .map(|c| {
                    (
                        c.id.clone(),
                        KnownCycle {
                            id: c.id.clone(),
                            level: c.level,
                            members: c.members.clone(),
                            discovered_at: c.discovered_at,
                        },
                    )
                })
                .collect();
            self.known.insert(*level, entries);
        }
    }

    /// Every known cycle, ordered by level then id.
    pub fn known(&self) -> impl Iterator<Item = &KnownCycle> {
        self.known.values().flat_map(BTreeMap::values)
    }

    /// Known ids on `level`.
    #[must_use]
    pub fn known_ids(&self, level: AnalysisLevel) -> BTreeSet<String> {
        self.known
            .get(&level)
            .map(|k| k.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DependencyNode;
    use chrono::Duration;

    fn members(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn graph() -> LevelGraph {
        let mut g = LevelGraph::new();
        for (from, to) in [("X", "Y"), ("Y", "X"), ("M", "N"), ("N", "M")] {
            let mut node = DependencyNode::new(from, from, from, "a.cs".into());
            node.dependencies.push(to.to_string());
            g.apply(node);
        }
        g
    }

    #[test]
    fn first_run_marks_everything_new() {
        let tracker = CycleTracker::new();
        let diff = tracker.diff(AnalysisLevel::Namespace, vec![members(&["X", "Y"])], &graph(), Utc::now());

        assert_eq!(diff.cycles.len(), 1);
        assert!(diff.cycles[0].is_new);
        assert_eq!(diff.cycles[0].edges.len(), 2);
        assert!(diff.resolved.is_empty());
    }

    #[test]
    fn rotated_cycle_persists_with_original_timestamp() {
        let mut tracker = CycleTracker::new();
        let first_seen = Utc::now() - Duration::hours(1);
        let first = tracker.diff(AnalysisLevel::Namespace, vec![members(&["X", "Y"])], &graph(), first_seen);
        tracker.commit(&[AnalysisLevel::Namespace], &first.cycles);

        let second = tracker.diff(AnalysisLevel::Namespace, vec![members(&["Y", "X"])], &graph(), Utc::now());

        assert!(!second.cycles[0].is_new);
        assert_eq!(second.cycles[0].id, first.cycles[0].id);
        assert_eq!(second.cycles[0].discovered_at, first_seen);
        assert!(second.resolved.is_empty());
    }

    #[test]
    fn vanished_cycle_is_resolved_with_members() {
        let mut tracker = CycleTracker::new();
        let first = tracker.diff(
            AnalysisLevel::Namespace,
            vec![members(&["X", "Y"]), members(&["M", "N"])],
            &graph(),
            Utc::now(),
        );
        tracker.commit(&[AnalysisLevel::Namespace], &first.cycles);

        let second = tracker.diff(AnalysisLevel::Namespace, vec![members(&["M", "N"])], &graph(), Utc::now());

        assert_eq!(second.resolved.len(), 1);
        assert_eq!(second.resolved[0].members, members(&["X", "Y"]));
        assert_eq!(second.resolved[0].id, cycle_id(&["X", "Y"]));
    }

    #[test]
    fn diff_without_commit_leaves_history_untouched() {
        let mut tracker = CycleTracker::new();
        let first = tracker.diff(AnalysisLevel::Class, vec![members(&["X", "Y"])], &graph(), Utc::now());
        tracker.commit(&[AnalysisLevel::Class], &first.cycles);

        let _discarded = tracker.diff(AnalysisLevel::Class, vec![], &graph(), Utc::now());

        assert_eq!(tracker.known_ids(AnalysisLevel::Class), BTreeSet::from([cycle_id(&["X", "Y"])]));
    }

    #[test]
    fn levels_are_tracked_independently() {
        let mut tracker = CycleTracker::new();
        let ns = tracker.diff(AnalysisLevel::Namespace, vec![members(&["X", "Y"])], &graph(), Utc::now());
        tracker.commit(&[AnalysisLevel::Namespace], &ns.cycles);

        let class = tracker.diff(AnalysisLevel::Class, vec![members(&["X", "Y"])], &graph(), Utc::now());

        assert!(class.cycles[0].is_new);
        assert!(tracker.diff(AnalysisLevel::Class, vec![], &graph(), Utc::now()).resolved.is_empty());
    }

    #[test]
    fn duplicate_member_sets_are_reported_once() {
        let tracker = CycleTracker::new();
        let diff = tracker.diff(
            AnalysisLevel::System,
            vec![members(&["X", "Y"]), members(&["Y", "X"])],
            &graph(),
            Utc::now(),
        );
        assert_eq!(diff.cycles.len(), 1);
    }

    #[test]
    fn restored_tracker_knows_persisted_cycles() {
        let known = KnownCycle {
            id: cycle_id(&["X", "Y"]),
            level: AnalysisLevel::Namespace,
            members: members(&["X", "Y"]),
            discovered_at: Utc::now(),
        };
        let tracker = CycleTracker::from_known([known]);

        let diff = tracker.diff(AnalysisLevel::Namespace, vec![members(&["X", "Y"])], &graph(), Utc::now());

        assert!(!diff.cycles[0].is_new);
        assert_eq!(tracker.known().count(), 1);
    }
}
