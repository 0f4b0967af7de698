//! Prerequisite graph
//!
//! Edges point from a feature to the features it requires. Referenced ids
//! without a feature of their own are still nodes, with no outgoing edges.

use serde::{Deserialize, Serialize};
use shared_types::{Feature, FeatureId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteGraph {
    /// feature -> its prerequisites
    pub edges: BTreeMap<FeatureId, BTreeSet<FeatureId>>,
}

impl PrerequisiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<FeatureId>) {
        self.edges.entry(id.into()).or_default();
    }

    pub fn add_edge(&mut self, from: impl Into<FeatureId>, to: impl Into<FeatureId>) {
        let to = to.into();
        self.edges.entry(to.clone()).or_default();
        self.edges.entry(from.into()).or_default().insert(to);
    }

    pub fn prerequisites_of(&self, id: &str) -> impl Iterator<Item = &FeatureId> {
        self.edges.get(id).into_iter().flatten()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FeatureId> {
        self.edges.keys()
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }
}

/// Build the graph from a consistent snapshot of an organization's features.
pub fn build_graph<'a>(features: impl IntoIterator<Item = &'a Feature>) -> PrerequisiteGraph {
    let mut graph = PrerequisiteGraph::new();
    for feature in features {
        graph.add_node(feature.id.clone());
        for prerequisite in feature.prerequisite_ids() {
            graph.add_edge(feature.id.clone(), prerequisite);
        }
    }
    graph
}
