//! # Core Domain Entities
//!
//! Defines the source-of-truth entities the engine compiles from.
//!
//! ## Clusters
//!
//! - **Features**: `Feature`, `FeatureEnvironment`, `FeatureDraft`, `Rule`, `RuleKind`
//! - **Targeting constructs**: `SavedGroup`, `Prerequisite`, `Holdout`
//! - **Organization**: `Environment`, `SdkConnection`, `ConnectionCapabilities`,
//!   `OrganizationSettings`, `Organization`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub type OrganizationId = String;
pub type FeatureId = String;
pub type EnvironmentId = String;
pub type ProjectId = String;
pub type SavedGroupId = String;
pub type HoldoutId = String;
pub type ConnectionId = String;

/// User attributes a targeting condition is evaluated against.
pub type Attributes = serde_json::Map<String, Value>;

/// Prefix of the pseudo-feature key a holdout is compiled to.
pub const HOLDOUT_FEATURE_PREFIX: &str = "$holdout:";

/// Value served to users bucketed into a holdout's control group.
pub const HOLDOUT_CONTROL_VALUE: &str = "holdoutcontrol";

/// Value served to users bucketed into a holdout's treatment group.
pub const HOLDOUT_TREATMENT_VALUE: &str = "holdouttreatment";

fn default_true() -> bool {
    true
}

fn full_coverage() -> f64 {
    1.0
}

fn default_hash_attribute() -> String {
    "id".to_string()
}

fn default_holdout_split() -> f64 {
    0.5
}

// =============================================================================
// CLUSTER A: FEATURES
// =============================================================================

/// Declared type of a feature's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Boolean,
    Number,
    String,
    Json,
}

/// A feature flag as stored by the Feature Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Stable key.
    pub id: FeatureId,
    pub organization: OrganizationId,
    pub value_type: ValueType,
    pub default_value: Value,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub project: Option<ProjectId>,
    /// Per-environment `{enabled, rules}`.
    #[serde(default)]
    pub environments: BTreeMap<EnvironmentId, FeatureEnvironment>,
    /// Top-level gating prerequisites. A failing one turns the whole feature off.
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, Value>,
    /// Opts the feature out of staleness detection.
    #[serde(default)]
    pub never_stale: bool,
    /// Pending, unpublished revision.
    #[serde(default)]
    pub draft: Option<FeatureDraft>,
    pub revision: u64,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl Feature {
    pub fn new(
        id: impl Into<FeatureId>,
        organization: impl Into<OrganizationId>,
        value_type: ValueType,
        default_value: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            organization: organization.into(),
            value_type,
            default_value,
            archived: false,
            project: None,
            environments: BTreeMap::new(),
            prerequisites: Vec::new(),
            tags: Vec::new(),
            custom_fields: BTreeMap::new(),
            never_stale: false,
            draft: None,
            revision: 1,
            date_created: now,
            date_updated: now,
        }
    }

    pub fn with_project(mut self, project: impl Into<ProjectId>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_environment(
        mut self,
        environment: impl Into<EnvironmentId>,
        settings: FeatureEnvironment,
    ) -> Self {
        self.environments.insert(environment.into(), settings);
        self
    }

    pub fn with_prerequisite(mut self, prerequisite: Prerequisite) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }

    pub fn with_date_updated(mut self, date: DateTime<Utc>) -> Self {
        self.date_updated = date;
        self
    }

    /// Whether the feature passes a payload project filter.
    ///
    /// An empty filter accepts everything, and a feature without a project
    /// is part of every project's payload.
    pub fn matches_project_filter(&self, projects: &[ProjectId]) -> bool {
        if projects.is_empty() {
            return true;
        }
        match &self.project {
            Some(project) => projects.contains(project),
            None => true,
        }
    }

    /// Every feature id this feature references as a prerequisite, at the
    /// top level or from any environment's rules.
    pub fn prerequisite_ids(&self) -> BTreeSet<FeatureId> {
        let mut ids: BTreeSet<FeatureId> = self
            .prerequisites
            .iter()
            .map(|p| p.feature_id.clone())
            .collect();
        for settings in self.environments.values() {
            for rule in &settings.rules {
                ids.extend(rule.prerequisites.iter().map(|p| p.feature_id.clone()));
            }
        }
        ids
    }

    /// Every saved group id referenced from any environment's rules.
    pub fn referenced_saved_groups(&self) -> BTreeSet<SavedGroupId> {
        self.environments
            .values()
            .flat_map(|settings| settings.rules.iter())
            .flat_map(|rule| rule.saved_groups.iter())
            .flat_map(|targeting| targeting.ids.iter().cloned())
            .collect()
    }
}

/// Per-environment configuration of a feature.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEnvironment {
    pub enabled: bool,
    /// Ordered by evaluation priority: first match wins.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl FeatureEnvironment {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// An unpublished revision of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDraft {
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    #[serde(default)]
    pub environments: BTreeMap<EnvironmentId, Vec<Rule>>,
}

/// One targeting/assignment unit within a feature's environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique within feature + environment. Empty ids are assigned by the compiler.
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    /// Targeting expression tree.
    #[serde(default)]
    pub condition: Option<Value>,
    #[serde(default)]
    pub saved_groups: Vec<SavedGroupTargeting>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(default)]
    pub schedule: Option<ScheduleWindow>,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl Rule {
    pub fn new(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            description: String::new(),
            condition: None,
            saved_groups: Vec::new(),
            prerequisites: Vec::new(),
            schedule: None,
            kind,
        }
    }

    pub fn force(id: impl Into<String>, value: Value) -> Self {
        Self::new(id, RuleKind::Force(ForceRule { value }))
    }

    pub fn rollout(
        id: impl Into<String>,
        value: Value,
        coverage: f64,
        hash_attribute: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            RuleKind::Rollout(RolloutRule {
                value,
                coverage,
                hash_attribute: hash_attribute.into(),
                seed: None,
                hash_version: HashVersion::V1,
            }),
        )
    }

    pub fn experiment(id: impl Into<String>, experiment: ExperimentRef) -> Self {
        Self::new(id, RuleKind::Experiment(experiment))
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_saved_groups(mut self, targeting: SavedGroupTargeting) -> Self {
        self.saved_groups.push(targeting);
        self
    }

    pub fn with_prerequisite(mut self, prerequisite: Prerequisite) -> Self {
        self.prerequisites.push(prerequisite);
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleWindow) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// True when the rule has no targeting of any kind.
    pub fn is_untargeted(&self) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |c| c.as_object().map_or(false, |o| o.is_empty()))
            && self.saved_groups.is_empty()
            && self.prerequisites.is_empty()
            && self.schedule.is_none()
    }
}

/// The closed set of rule variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleKind {
    Force(ForceRule),
    Rollout(RolloutRule),
    Experiment(ExperimentRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceRule {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutRule {
    pub value: Value,
    /// Fraction of eligible traffic in `[0, 1]`.
    pub coverage: f64,
    #[serde(default = "default_hash_attribute")]
    pub hash_attribute: String,
    /// Hash seed; defaults to the feature id.
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub hash_version: HashVersion,
}

/// Reference to an experiment from a feature rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRef {
    pub experiment_id: String,
    pub tracking_key: String,
    #[serde(default = "default_hash_attribute")]
    pub hash_attribute: String,
    #[serde(default)]
    pub fallback_attribute: Option<String>,
    /// Stored per rule and never upgraded implicitly.
    #[serde(default)]
    pub hash_version: HashVersion,
    pub variations: Vec<Variation>,
    #[serde(default = "full_coverage")]
    pub coverage: f64,
    #[serde(default)]
    pub namespace: Option<NamespaceRange>,
    #[serde(default)]
    pub status: ExperimentStatus,
    /// Variation released to everyone once the experiment stops.
    #[serde(default)]
    pub released_variation: Option<usize>,
    #[serde(default)]
    pub disable_sticky_bucketing: bool,
    #[serde(default)]
    pub bucket_version: u32,
}

impl ExperimentRef {
    pub fn new(
        experiment_id: impl Into<String>,
        tracking_key: impl Into<String>,
        variations: Vec<Variation>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            tracking_key: tracking_key.into(),
            hash_attribute: default_hash_attribute(),
            fallback_attribute: None,
            hash_version: HashVersion::V2,
            variations,
            coverage: 1.0,
            namespace: None,
            status: ExperimentStatus::Running,
            released_variation: None,
            disable_sticky_bucketing: false,
            bucket_version: 0,
        }
    }

    pub fn weights(&self) -> Vec<f64> {
        self.variations.iter().map(|v| v.weight).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub key: String,
    pub value: Value,
    pub weight: f64,
}

impl Variation {
    pub fn new(key: impl Into<String>, value: Value, weight: f64) -> Self {
        Self {
            key: key.into(),
            value,
            weight,
        }
    }
}

/// Bucketing hash algorithm version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HashVersion {
    /// Legacy single FNV-1a pass.
    #[default]
    V1,
    /// Double FNV-1a pass, decorrelated across experiments.
    V2,
}

impl TryFrom<u8> for HashVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(format!("unsupported hash version {}", other)),
        }
    }
}

impl From<HashVersion> for u8 {
    fn from(version: HashVersion) -> Self {
        match version {
            HashVersion::V1 => 1,
            HashVersion::V2 => 2,
        }
    }
}

/// Namespace slice `[start, end)` an experiment is restricted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRange {
    pub id: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Draft,
    #[default]
    Running,
    Stopped,
}

/// Time window `[start, end)` outside which a rule is inactive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleWindow {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl ScheduleWindow {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| now >= start) && self.end.map_or(true, |end| now < end)
    }

    /// The next instant at which `is_active` may change.
    pub fn next_boundary(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        [self.start, self.end]
            .into_iter()
            .flatten()
            .filter(|t| *t > now)
            .min()
    }
}

// =============================================================================
// CLUSTER B: TARGETING CONSTRUCTS
// =============================================================================

/// A dependency on another feature's evaluated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub feature_id: FeatureId,
    /// Evaluated against `{"value": <upstream value>}`.
    pub condition: Value,
}

impl Prerequisite {
    pub fn new(feature_id: impl Into<FeatureId>, condition: Value) -> Self {
        Self {
            feature_id: feature_id.into(),
            condition,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedGroupMatch {
    #[default]
    Any,
    All,
    None,
}

/// A rule's reference to one or more saved groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGroupTargeting {
    #[serde(rename = "match")]
    pub match_type: SavedGroupMatch,
    pub ids: Vec<SavedGroupId>,
}

impl SavedGroupTargeting {
    pub fn new(match_type: SavedGroupMatch, ids: Vec<SavedGroupId>) -> Self {
        Self { match_type, ids }
    }
}

/// A named, reusable set or condition of users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGroup {
    pub id: SavedGroupId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: SavedGroupKind,
    #[serde(default)]
    pub projects: Vec<ProjectId>,
    pub date_updated: DateTime<Utc>,
}

impl SavedGroup {
    pub fn list(id: impl Into<SavedGroupId>, attribute_key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind: SavedGroupKind::List {
                attribute_key: attribute_key.into(),
                values,
            },
            projects: Vec::new(),
            date_updated: Utc::now(),
        }
    }

    pub fn condition(id: impl Into<SavedGroupId>, condition: Value) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind: SavedGroupKind::Condition { condition },
            projects: Vec::new(),
            date_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SavedGroupKind {
    /// Inline id list matched against one attribute.
    #[serde(rename_all = "camelCase")]
    List {
        attribute_key: String,
        values: Vec<String>,
    },
    /// Runtime targeting condition.
    Condition { condition: Value },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldoutStatus {
    #[default]
    Running,
    Stopped,
}

/// One step of a holdout's ramp-up schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RampStep {
    pub start: DateTime<Utc>,
    pub coverage: f64,
}

/// An organization-wide control group gating several features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holdout {
    pub id: HoldoutId,
    #[serde(default)]
    pub name: String,
    pub status: HoldoutStatus,
    /// Empty means every project.
    #[serde(default)]
    pub projects: Vec<ProjectId>,
    /// Environments the holdout is enabled in.
    #[serde(default)]
    pub environments: BTreeMap<EnvironmentId, bool>,
    /// Features the holdout wraps.
    #[serde(default)]
    pub feature_ids: BTreeSet<FeatureId>,
    #[serde(default = "default_hash_attribute")]
    pub hash_attribute: String,
    #[serde(default)]
    pub hash_version: HashVersion,
    /// Weight of the control (held-out) group.
    #[serde(default = "default_holdout_split")]
    pub split: f64,
    #[serde(default)]
    pub ramp: Vec<RampStep>,
    pub date_updated: DateTime<Utc>,
}

impl Holdout {
    pub fn new(id: impl Into<HoldoutId>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            status: HoldoutStatus::Running,
            projects: Vec::new(),
            environments: BTreeMap::new(),
            feature_ids: BTreeSet::new(),
            hash_attribute: default_hash_attribute(),
            hash_version: HashVersion::V2,
            split: default_holdout_split(),
            ramp: Vec::new(),
            date_updated: Utc::now(),
        }
    }

    pub fn with_project(mut self, project: impl Into<ProjectId>) -> Self {
        self.projects.push(project.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<EnvironmentId>) -> Self {
        self.environments.insert(environment.into(), true);
        self
    }

    pub fn with_feature(mut self, feature_id: impl Into<FeatureId>) -> Self {
        self.feature_ids.insert(feature_id.into());
        self
    }

    /// Key of the pseudo-feature carrying the holdout's bucketing rule.
    pub fn feature_key(&self) -> String {
        format!("{}{}", HOLDOUT_FEATURE_PREFIX, self.id)
    }

    pub fn is_running(&self) -> bool {
        self.status == HoldoutStatus::Running
    }

    pub fn is_enabled_in(&self, environment: &str) -> bool {
        self.environments.get(environment).copied().unwrap_or(false)
    }

    /// A holdout without projects applies everywhere; otherwise the feature
    /// must carry one of the holdout's projects.
    pub fn shares_project_with(&self, project: Option<&ProjectId>) -> bool {
        if self.projects.is_empty() {
            return true;
        }
        project.map_or(false, |p| self.projects.contains(p))
    }

    /// Whether the holdout is visible under a payload project filter.
    pub fn matches_project_filter(&self, projects: &[ProjectId]) -> bool {
        projects.is_empty()
            || self.projects.is_empty()
            || self.projects.iter().any(|p| projects.contains(p))
    }

    /// Coverage at `now` according to the ramp schedule.
    ///
    /// No steps means full coverage; before the first step, zero.
    pub fn coverage_at(&self, now: DateTime<Utc>) -> f64 {
        if self.ramp.is_empty() {
            return 1.0;
        }
        let mut steps: Vec<&RampStep> = self.ramp.iter().collect();
        steps.sort_by_key(|s| s.start);
        steps
            .iter()
            .rev()
            .find(|s| s.start <= now)
            .map_or(0.0, |s| s.coverage.clamp(0.0, 1.0))
    }

    /// Next ramp step strictly after `now`.
    pub fn next_ramp_change(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.ramp.iter().map(|s| s.start).filter(|t| *t > now).min()
    }
}

// =============================================================================
// CLUSTER C: ORGANIZATION
// =============================================================================

/// A deployment environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: EnvironmentId,
    /// Environment whose feature settings are inherited when missing.
    #[serde(default)]
    pub parent: Option<EnvironmentId>,
    /// Allowed projects. Empty means every project.
    #[serde(default)]
    pub projects: Vec<ProjectId>,
    /// Enabled state of features that have no settings for this environment.
    #[serde(default)]
    pub default_state: bool,
}

impl Environment {
    pub fn new(id: impl Into<EnvironmentId>) -> Self {
        Self {
            id: id.into(),
            parent: None,
            projects: Vec::new(),
            default_state: true,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<EnvironmentId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn allows_project(&self, project: Option<&ProjectId>) -> bool {
        if self.projects.is_empty() {
            return true;
        }
        project.map_or(true, |p| self.projects.contains(p))
    }
}

/// What a connection is able to consume from a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCapabilities {
    #[serde(default)]
    pub encryption: bool,
    #[serde(default)]
    pub include_drafts: bool,
    #[serde(default)]
    pub include_rule_ids: bool,
    #[serde(default)]
    pub hash_secure_attributes: bool,
    #[serde(default)]
    pub remote_evaluation: bool,
    #[serde(default)]
    pub saved_group_references: bool,
}

impl ConnectionCapabilities {
    /// Everything exposed verbatim: used for the cached base payload.
    pub fn full() -> Self {
        Self {
            encryption: false,
            include_drafts: true,
            include_rule_ids: true,
            hash_secure_attributes: false,
            remote_evaluation: false,
            saved_group_references: true,
        }
    }
}

/// An SDK connection consuming one environment's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkConnection {
    pub id: ConnectionId,
    pub organization: OrganizationId,
    pub environment: EnvironmentId,
    #[serde(default)]
    pub projects: Vec<ProjectId>,
    #[serde(default)]
    pub capabilities: ConnectionCapabilities,
    /// Hex-encoded 256-bit key, required when `capabilities.encryption`.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl SdkConnection {
    /// Whether a change scoped to `projects` can alter this connection's payload.
    pub fn overlaps_projects(&self, projects: &BTreeSet<ProjectId>) -> bool {
        self.projects.is_empty()
            || projects.is_empty()
            || self.projects.iter().any(|p| projects.contains(p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeDatatype {
    String,
    Number,
    Boolean,
    StringArray,
    NumberArray,
    SecureString,
    SecureStringArray,
    Enum,
}

impl AttributeDatatype {
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::SecureString | Self::SecureStringArray)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSchemaEntry {
    pub property: String,
    pub datatype: AttributeDatatype,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSettings {
    #[serde(default)]
    pub sticky_bucketing_enabled: bool,
    #[serde(default)]
    pub secure_attribute_salt: String,
    #[serde(default)]
    pub attribute_schema: Vec<AttributeSchemaEntry>,
}

impl OrganizationSettings {
    pub fn secure_attributes(&self) -> BTreeSet<String> {
        self.attribute_schema
            .iter()
            .filter(|a| a.datatype.is_secure())
            .map(|a| a.property.clone())
            .collect()
    }
}

/// Organization-level configuration the engine reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: OrganizationId,
    #[serde(default)]
    pub settings: OrganizationSettings,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub connections: Vec<SdkConnection>,
}

impl Organization {
    pub fn new(id: impl Into<OrganizationId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environments.push(environment);
        self
    }

    pub fn with_connection(mut self, connection: SdkConnection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn environment(&self, id: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&SdkConnection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Environments that inherit (directly or not) from `id`, including `id`.
    pub fn environment_with_descendants(&self, id: &str) -> BTreeSet<EnvironmentId> {
        let mut result = BTreeSet::new();
        result.insert(id.to_string());
        loop {
            let before = result.len();
            for env in &self.environments {
                if let Some(parent) = &env.parent {
                    if result.contains(parent) {
                        result.insert(env.id.clone());
                    }
                }
            }
            if result.len() == before {
                return result;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_rule_kind_serde_is_tagged() {
        let rule = Rule::force("r1", json!("on"));
        let encoded = serde_json::to_value(&rule).unwrap();
        assert_eq!(encoded["type"], "force");
        assert_eq!(encoded["value"], "on");

        let decoded: Rule = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, rule);
    }

    #[test]
    fn test_hash_version_rejects_unknown() {
        let parsed: Result<HashVersion, _> = serde_json::from_value(json!(3));
        assert!(parsed.is_err());
        let v2: HashVersion = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(v2, HashVersion::V2);
    }

    #[test]
    fn test_missing_hash_version_is_legacy() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "r",
            "type": "rollout",
            "value": true,
            "coverage": 0.5
        }))
        .unwrap();
        match rule.kind {
            RuleKind::Rollout(r) => {
                assert_eq!(r.hash_version, HashVersion::V1);
                assert_eq!(r.hash_attribute, "id");
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_schedule_window() {
        let now = Utc::now();
        let window = ScheduleWindow {
            start: Some(now - Duration::hours(1)),
            end: Some(now + Duration::hours(1)),
        };
        assert!(window.is_active(now));
        assert!(!window.is_active(now + Duration::hours(2)));
        assert_eq!(window.next_boundary(now), window.end);
    }

    #[test]
    fn test_holdout_project_scoping() {
        let holdout = Holdout::new("h").with_project("p1");
        assert!(holdout.shares_project_with(Some(&"p1".to_string())));
        assert!(!holdout.shares_project_with(Some(&"p2".to_string())));
        assert!(!holdout.shares_project_with(None));
        assert!(Holdout::new("h2").shares_project_with(None));
    }

    #[test]
    fn test_holdout_ramp() {
        let now = Utc::now();
        let mut holdout = Holdout::new("h");
        assert_eq!(holdout.coverage_at(now), 1.0);

        holdout.ramp = vec![
            RampStep { start: now + Duration::days(1), coverage: 1.0 },
            RampStep { start: now - Duration::days(1), coverage: 0.25 },
        ];
        assert_eq!(holdout.coverage_at(now), 0.25);
        assert_eq!(holdout.coverage_at(now - Duration::days(2)), 0.0);
        assert_eq!(holdout.coverage_at(now + Duration::days(2)), 1.0);
        assert_eq!(holdout.next_ramp_change(now), Some(now + Duration::days(1)));
    }

    #[test]
    fn test_feature_project_filter() {
        let scoped = Feature::new("f", "org", ValueType::Boolean, json!(false)).with_project("p1");
        let global = Feature::new("g", "org", ValueType::Boolean, json!(false));
        let p2 = vec!["p2".to_string()];
        assert!(!scoped.matches_project_filter(&p2));
        assert!(scoped.matches_project_filter(&[]));
        assert!(global.matches_project_filter(&p2));
    }

    #[test]
    fn test_environment_descendants() {
        let org = Organization::new("org")
            .with_environment(Environment::new("production"))
            .with_environment(Environment::new("staging").with_parent("production"))
            .with_environment(Environment::new("qa").with_parent("staging"))
            .with_environment(Environment::new("dev"));
        let affected = org.environment_with_descendants("production");
        assert_eq!(affected.len(), 3);
        assert!(!affected.contains("dev"));
    }

    #[test]
    fn test_prerequisite_ids_cover_rules() {
        let feature = Feature::new("f", "org", ValueType::Boolean, json!(false))
            .with_prerequisite(Prerequisite::new("a", json!({"value": true})))
            .with_environment(
                "production",
                FeatureEnvironment::new(true).with_rule(
                    Rule::force("r", json!(true))
                        .with_prerequisite(Prerequisite::new("b", json!({"value": true}))),
                ),
            );
        let ids = feature.prerequisite_ids();
        assert!(ids.contains("a"));
        assert!(ids.contains("b"));
    }
}
