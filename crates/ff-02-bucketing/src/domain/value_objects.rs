//! Value objects for Bucketing

use serde::{Deserialize, Serialize};
use shared_types::{HashVersion, NamespaceRange};

/// Half-open interval `[start, end)` of the hash space owned by one variation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketRange {
    pub start: f64,
    pub end: f64,
}

impl BucketRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Strict upper bound: a fraction equal to `end` belongs to the next range.
    pub fn contains(&self, fraction: f64) -> bool {
        fraction >= self.start && fraction < self.end
    }
}

/// Identity of a persisted assignment.
///
/// `attribute_key` is `"<attribute>||<value>"`; bumping `bucket_version`
/// on an experiment makes older assignments unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyAssignmentKey {
    pub attribute_key: String,
    pub tracking_key: String,
    pub bucket_version: u32,
}

impl StickyAssignmentKey {
    pub fn new(
        attribute: &str,
        value: &str,
        tracking_key: impl Into<String>,
        bucket_version: u32,
    ) -> Self {
        Self {
            attribute_key: format!("{}||{}", attribute, value),
            tracking_key: tracking_key.into(),
            bucket_version,
        }
    }
}

/// Everything needed to place one user into an experiment or rollout.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRequest {
    pub tracking_key: String,
    pub hash_attribute: String,
    pub hash_value: String,
    pub hash_version: HashVersion,
    /// Keys of the variations, parallel to `weights`
    pub variation_keys: Vec<String>,
    pub weights: Vec<f64>,
    pub coverage: f64,
    pub namespace: Option<NamespaceRange>,
    /// Organization and rule both allow sticky bucketing
    pub sticky: bool,
    pub bucket_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignmentSource {
    /// Freshly computed from the hash
    Hashed,
    /// Read back from the sticky bucket store
    Sticky,
}

/// Result of a successful assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub variation: usize,
    /// `None` for sticky assignments
    pub fraction: Option<f64>,
    pub source: AssignmentSource,
}

/// Why a user ended up outside the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Exclusion {
    NotInNamespace,
    NotInCoverage,
}

/// Outcome of [`BucketingService::assign`](crate::BucketingService::assign).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum AssignmentOutcome {
    Assigned(Assignment),
    Excluded { reason: Exclusion },
}

impl AssignmentOutcome {
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Self::Assigned(assignment) => Some(assignment),
            Self::Excluded { .. } => None,
        }
    }
}
