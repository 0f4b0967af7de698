//! Configuration for the Sample Evaluator

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// Evaluate rules of draft experiments instead of skipping them
    pub include_drafts: bool,
    /// Maximum nesting of parent-condition lookups
    pub max_parent_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            include_drafts: false,
            max_parent_depth: 16,
        }
    }
}
