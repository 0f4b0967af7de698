//! Evaluation input

use ff_01_targeting::SavedGroupValues;
use shared_types::{Attributes, CompiledFeatureDefinition, FeatureId, PayloadContents};
use std::collections::BTreeMap;

/// Compiled features of one environment plus the sample attributes.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub features: &'a BTreeMap<FeatureId, CompiledFeatureDefinition>,
    pub saved_groups: &'a SavedGroupValues,
    pub attributes: &'a Attributes,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        features: &'a BTreeMap<FeatureId, CompiledFeatureDefinition>,
        saved_groups: &'a SavedGroupValues,
        attributes: &'a Attributes,
    ) -> Self {
        Self {
            features,
            saved_groups,
            attributes,
        }
    }

    pub fn from_contents(contents: &'a PayloadContents, attributes: &'a Attributes) -> Self {
        Self::new(&contents.features, &contents.saved_groups, attributes)
    }
}
