//! One-shot resolution over a feature snapshot

use crate::algorithms::{detect_cycle, topo_order};
use crate::domain::errors::CycleError;
use crate::domain::graph::{build_graph, PrerequisiteGraph};
use shared_types::{Feature, FeatureId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Compilation order for a snapshot, with cyclic features split out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub graph: PrerequisiteGraph,
    /// Prerequisites-first order of every feature that can be compiled
    pub order: Vec<FeatureId>,
    /// Features on or behind a cycle, with the offending path
    pub cyclic: BTreeMap<FeatureId, Vec<FeatureId>>,
}

impl Resolution {
    pub fn is_cyclic(&self, id: &str) -> bool {
        self.cyclic.contains_key(id)
    }

    pub fn cycle_error(&self, id: &str) -> Option<CycleError> {
        self.cyclic
            .get(id)
            .map(|path| CycleError::Cycle { path: path.clone() })
    }
}

/// Resolve a snapshot: every feature that reaches a cycle is excluded and
/// the rest is ordered prerequisites-first.
pub fn resolve(features: &[Feature]) -> Resolution {
    let graph = build_graph(features);

    let mut cyclic = BTreeMap::new();
    for feature in features {
        if let Some(path) = detect_cycle(&graph, &feature.id) {
            warn!(
                feature_id = %feature.id,
                cycle = %path.join(" → "),
                "Feature excluded: prerequisite cycle"
            );
            cyclic.insert(feature.id.clone(), path);
        }
    }

    let mut acyclic = PrerequisiteGraph::new();
    for (id, prerequisites) in &graph.edges {
        if cyclic.contains_key(id) {
            continue;
        }
        acyclic.add_node(id.clone());
        for prerequisite in prerequisites {
            acyclic.add_edge(id.clone(), prerequisite.clone());
        }
    }

    // Everything that reaches a cycle was removed above, so the rest sorts.
    let order = topo_order(&acyclic).unwrap_or_default();
    debug!(
        features = features.len(),
        ordered = order.len(),
        cyclic = cyclic.len(),
        "Resolved prerequisite graph"
    );

    Resolution {
        graph,
        order,
        cyclic,
    }
}

/// Refuse an edit that would introduce a cycle through `updated`.
pub fn check_update(features: &[Feature], updated: &Feature) -> Result<(), CycleError> {
    let candidate = features
        .iter()
        .filter(|f| f.id != updated.id)
        .chain(std::iter::once(updated));
    let graph = build_graph(candidate);

    match detect_cycle(&graph, &updated.id) {
        Some(path) if path.contains(&updated.id) => Err(CycleError::Cycle { path }),
        _ => Ok(()),
    }
}

/// Features that directly list `id` as a prerequisite.
pub fn dependents_of(graph: &PrerequisiteGraph, id: &str) -> BTreeSet<FeatureId> {
    graph
        .edges
        .iter()
        .filter(|(_, prerequisites)| prerequisites.contains(id))
        .map(|(dependent, _)| dependent.clone())
        .collect()
}
