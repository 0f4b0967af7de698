//! Depth-first cycle detection
//!
//! Walks prerequisite edges from a start feature while keeping the active
//! path. Reaching a node that is already on the path closes a cycle; the
//! returned path starts and ends on that node, e.g. `A → B → C → A`.

use crate::domain::graph::PrerequisiteGraph;
use shared_types::FeatureId;
use std::collections::{btree_set, BTreeSet};

static NO_EDGES: BTreeSet<FeatureId> = BTreeSet::new();

fn prerequisites<'g>(graph: &'g PrerequisiteGraph, id: &str) -> btree_set::Iter<'g, FeatureId> {
    graph.edges.get(id).unwrap_or(&NO_EDGES).iter()
}

/// First cycle reachable from `start`, or `None` when every path from it
/// terminates.
pub fn detect_cycle(graph: &PrerequisiteGraph, start: &str) -> Option<Vec<FeatureId>> {
    let (start_id, _) = graph.edges.get_key_value(start)?;

    let mut path: Vec<&FeatureId> = vec![start_id];
    let mut on_path: BTreeSet<&str> = BTreeSet::from([start_id.as_str()]);
    let mut explored: BTreeSet<&str> = BTreeSet::new();
    let mut stack = vec![prerequisites(graph, start_id)];

    while let Some(frame) = stack.last_mut() {
        match frame.next() {
            Some(next) => {
                if on_path.contains(next.as_str()) {
                    let position = path.iter().position(|id| *id == next)?;
                    let mut cycle: Vec<FeatureId> =
                        path[position..].iter().map(|id| (*id).clone()).collect();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                if explored.contains(next.as_str()) {
                    continue;
                }
                path.push(next);
                on_path.insert(next.as_str());
                stack.push(prerequisites(graph, next));
            }
            None => {
                stack.pop();
                if let Some(done) = path.pop() {
                    on_path.remove(done.as_str());
                    explored.insert(done.as_str());
                }
            }
        }
    }

    None
}
