//! Per-connection projection of a compiled payload
//!
//! The cache stores one unscoped payload per (organization, environment).
//! Each client gets a projection of it: features and experiments outside
//! its projects are dropped, holdouts are kept only where a project
//! overlaps, and capability flags decide whether drafts, rule ids and
//! symbolic saved-group references survive.

use ff_04_rule_compiler::inline_group_references;
use serde_json::Value;
use shared_types::{
    CompiledFeatureDefinition, ConnectionCapabilities, ExperimentStatus, HoldoutSummary,
    PayloadContents, ProjectId, ResolvedRule, SavedGroupId, HOLDOUT_FEATURE_PREFIX,
};
use std::collections::{BTreeMap, BTreeSet};

/// What the client asked for.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionOptions<'a> {
    /// Empty means every project
    pub project_filter: &'a [ProjectId],
    pub capabilities: ConnectionCapabilities,
}

impl<'a> ProjectionOptions<'a> {
    pub fn new(project_filter: &'a [ProjectId], capabilities: ConnectionCapabilities) -> Self {
        Self {
            project_filter,
            capabilities,
        }
    }

    fn allows(&self, project: Option<&ProjectId>) -> bool {
        self.project_filter.is_empty()
            || project.map_or(true, |p| self.project_filter.contains(p))
    }

    fn allows_holdout(&self, holdout: &HoldoutSummary) -> bool {
        self.project_filter.is_empty()
            || holdout.projects.is_empty()
            || holdout.projects.iter().any(|p| self.project_filter.contains(p))
    }
}

/// Project `contents` for one client. Pure; the input is left untouched.
pub fn project_contents(contents: &PayloadContents, options: &ProjectionOptions<'_>) -> PayloadContents {
    let caps = options.capabilities;

    let holdouts: BTreeMap<_, _> = contents
        .holdouts
        .iter()
        .filter(|(_, h)| options.allows_holdout(h))
        .map(|(id, h)| (id.clone(), h.clone()))
        .collect();
    let holdout_keys: BTreeSet<&str> = holdouts.values().map(|h| h.feature_key.as_str()).collect();

    let mut features = BTreeMap::new();
    for (id, definition) in &contents.features {
        let keep = if id.starts_with(HOLDOUT_FEATURE_PREFIX) {
            holdout_keys.contains(id.as_str())
        } else {
            options.allows(definition.project.as_ref())
        };
        if keep {
            features.insert(
                id.clone(),
                project_definition(definition, &holdout_keys, caps, &contents.saved_groups),
            );
        }
    }

    let experiments = contents
        .experiments
        .iter()
        .filter(|e| options.allows(e.project.as_ref()))
        .filter(|e| caps.include_drafts || e.status != ExperimentStatus::Draft)
        .filter(|e| e.feature_id.starts_with(HOLDOUT_FEATURE_PREFIX) || features.contains_key(&e.feature_id))
        .cloned()
        .collect();

    let saved_groups = if caps.saved_group_references {
        let mut referenced = BTreeSet::new();
        for definition in features.values() {
            for rule in &definition.rules {
                if let Some(condition) = &rule.condition {
                    collect_group_references(condition, &mut referenced);
                }
            }
        }
        contents
            .saved_groups
            .iter()
            .filter(|(id, _)| referenced.contains(*id))
            .map(|(id, values)| (id.clone(), values.clone()))
            .collect()
    } else {
        BTreeMap::new()
    };

    PayloadContents {
        features,
        experiments,
        saved_groups,
        holdouts,
        encrypted_features: None,
        encrypted_saved_groups: None,
    }
}

fn project_definition(
    definition: &CompiledFeatureDefinition,
    holdout_keys: &BTreeSet<&str>,
    caps: ConnectionCapabilities,
    groups: &BTreeMap<SavedGroupId, Vec<String>>,
) -> CompiledFeatureDefinition {
    let rules = definition
        .rules
        .iter()
        .filter(|rule| caps.include_drafts || !rule.draft)
        .filter(|rule| holdout_parents_retained(rule, holdout_keys))
        .map(|rule| {
            let mut rule = rule.clone();
            if !caps.include_rule_ids {
                rule.id = None;
            }
            if !caps.saved_group_references {
                rule.condition = rule
                    .condition
                    .as_ref()
                    .map(|c| inline_group_references(c, groups));
            }
            rule
        })
        .collect();

    CompiledFeatureDefinition {
        default_value: definition.default_value.clone(),
        rules,
        project: None,
    }
}

/// A rule gated on a holdout that the client cannot see would reference a
/// feature missing from its payload, so it goes too.
fn holdout_parents_retained(rule: &ResolvedRule, holdout_keys: &BTreeSet<&str>) -> bool {
    rule.parent_conditions
        .iter()
        .filter(|p| p.id.starts_with(HOLDOUT_FEATURE_PREFIX))
        .all(|p| holdout_keys.contains(p.id.as_str()))
}

/// Saved group ids referenced through `$inGroup` / `$notInGroup`.
pub fn collect_group_references(condition: &Value, out: &mut BTreeSet<SavedGroupId>) {
    match condition {
        Value::Object(map) => {
            for (key, value) in map {
                match (key.as_str(), value.as_str()) {
                    ("$inGroup" | "$notInGroup", Some(id)) => {
                        out.insert(id.to_string());
                    }
                    _ => collect_group_references(value, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_group_references(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{
        ExperimentSummary, ForceAction, ParentCondition, RuleAction,
    };

    fn force(id: &str, value: Value) -> ResolvedRule {
        ResolvedRule::new(id, RuleAction::Force(ForceAction { value }))
    }

    fn contents() -> PayloadContents {
        let mut gated = force("holdout_h1", json!(false));
        gated.parent_conditions.push(ParentCondition {
            id: "$holdout:h1".into(),
            condition: json!({"value": "holdoutcontrol"}),
            gate: false,
        });
        let mut beta = force("fr_beta", json!(true));
        beta.condition = Some(json!({"id": {"$inGroup": "beta"}}));
        let mut draft = force("fr_draft", json!(true));
        draft.draft = true;

        let mut features = BTreeMap::new();
        features.insert(
            "wrapped".to_string(),
            CompiledFeatureDefinition {
                default_value: json!(false),
                rules: vec![gated, beta],
                project: Some("p2".into()),
            },
        );
        features.insert(
            "unscoped".to_string(),
            CompiledFeatureDefinition {
                default_value: json!("a"),
                rules: vec![draft],
                project: None,
            },
        );
        features.insert(
            "$holdout:h1".to_string(),
            CompiledFeatureDefinition {
                default_value: Value::Null,
                rules: vec![],
                project: None,
            },
        );

        let mut holdouts = BTreeMap::new();
        holdouts.insert(
            "h1".to_string(),
            HoldoutSummary {
                id: "h1".into(),
                feature_key: "$holdout:h1".into(),
                projects: vec!["p2".into()],
                feature_ids: vec!["wrapped".into()],
                coverage: 1.0,
            },
        );

        let mut saved_groups = BTreeMap::new();
        saved_groups.insert("beta".to_string(), vec!["u1".to_string()]);
        saved_groups.insert("unused".to_string(), vec!["u9".to_string()]);

        PayloadContents {
            features,
            experiments: vec![ExperimentSummary {
                key: "exp".into(),
                experiment_id: "exp".into(),
                feature_id: "unscoped".into(),
                status: ExperimentStatus::Draft,
                variations: vec!["a".into(), "b".into()],
                hash_attribute: "id".into(),
                project: None,
            }],
            saved_groups,
            holdouts,
            encrypted_features: None,
            encrypted_saved_groups: None,
        }
    }

    #[test]
    fn test_project_filter_drops_holdout_and_feature() {
        let filter = vec!["p1".to_string()];
        let projected = project_contents(
            &contents(),
            &ProjectionOptions::new(&filter, ConnectionCapabilities::full()),
        );
        assert!(!projected.features.contains_key("wrapped"));
        assert!(!projected.features.contains_key("$holdout:h1"));
        assert!(projected.holdouts.is_empty());
        assert!(projected.features.contains_key("unscoped"));
    }

    #[test]
    fn test_overlapping_filter_keeps_holdout_rule() {
        let filter = vec!["p1".to_string(), "p2".to_string()];
        let projected = project_contents(
            &contents(),
            &ProjectionOptions::new(&filter, ConnectionCapabilities::full()),
        );
        let wrapped = &projected.features["wrapped"];
        assert!(wrapped.rules[0].references_parent("$holdout:h1"));
        assert!(projected.features.contains_key("$holdout:h1"));
        assert_eq!(wrapped.project, None);
    }

    #[test]
    fn test_capabilities_strip_drafts_and_ids() {
        let caps = ConnectionCapabilities::default();
        let projected = project_contents(&contents(), &ProjectionOptions::new(&[], caps));

        assert!(projected.features["unscoped"].rules.is_empty());
        assert!(projected.experiments.is_empty());
        assert!(projected.features["wrapped"].rules.iter().all(|r| r.id.is_none()));
    }

    #[test]
    fn test_saved_group_inlining_versus_references() {
        let inline = project_contents(
            &contents(),
            &ProjectionOptions::new(&[], ConnectionCapabilities::default()),
        );
        assert_eq!(
            inline.features["wrapped"].rules[1].condition,
            Some(json!({"id": {"$in": ["u1"]}}))
        );
        assert!(inline.saved_groups.is_empty());

        let symbolic = project_contents(
            &contents(),
            &ProjectionOptions::new(&[], ConnectionCapabilities::full()),
        );
        assert_eq!(
            symbolic.features["wrapped"].rules[1].condition,
            Some(json!({"id": {"$inGroup": "beta"}}))
        );
        assert_eq!(symbolic.saved_groups.keys().collect::<Vec<_>>(), vec!["beta"]);
    }

    #[test]
    fn test_collect_group_references() {
        let mut ids = BTreeSet::new();
        collect_group_references(
            &json!({"$or": [{"id": {"$inGroup": "a"}}, {"id": {"$notInGroup": "b"}}]}),
            &mut ids,
        );
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
