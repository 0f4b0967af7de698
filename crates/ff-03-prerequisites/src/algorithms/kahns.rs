//! Kahn's Topological Sort
//!
//! Orders features so that every prerequisite precedes its dependents.
//! O(V + E); ties are broken by feature id for deterministic output.

use super::dfs::detect_cycle;
use crate::domain::errors::CycleError;
use crate::domain::graph::PrerequisiteGraph;
use shared_types::FeatureId;
use std::collections::BTreeMap;

/// Prerequisites-first evaluation order, or the first cycle found.
pub fn topo_order(graph: &PrerequisiteGraph) -> Result<Vec<FeatureId>, CycleError> {
    // 1. In-degree is the number of unresolved prerequisites
    let mut in_degree: BTreeMap<&FeatureId, usize> = graph
        .edges
        .iter()
        .map(|(id, prerequisites)| (id, prerequisites.len()))
        .collect();

    // 2. Reverse edges: prerequisite -> dependents
    let mut dependents: BTreeMap<&FeatureId, Vec<&FeatureId>> = BTreeMap::new();
    for (id, prerequisites) in &graph.edges {
        for prerequisite in prerequisites {
            dependents.entry(prerequisite).or_default().push(id);
        }
    }

    // 3. Seed with features that have no prerequisites (already sorted by BTreeMap)
    let mut queue: Vec<&FeatureId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());

    while !queue.is_empty() {
        let current = std::mem::take(&mut queue);
        let mut next_queue = Vec::new();

        for node in current {
            order.push(node.clone());
            let Some(children) = dependents.get(node) else {
                continue;
            };
            for child in children {
                let Some(degree) = in_degree.get_mut(child) else {
                    continue;
                };
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    next_queue.push(*child);
                }
            }
        }

        next_queue.sort();
        queue = next_queue;
    }

    // 4. Leftover nodes sit on or behind a cycle
    if order.len() < graph.node_count() {
        let path = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .find_map(|(id, _)| detect_cycle(graph, id))
            .unwrap_or_default();
        return Err(CycleError::Cycle { path });
    }

    Ok(order)
}
