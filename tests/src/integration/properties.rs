//! # Cross-Crate Properties
//!
//! Rule id uniqueness over arbitrary rule lists, the rollout coverage
//! boundary as seen by the evaluator, and hash versions surviving
//! compilation and projection untouched.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{attributes, engine, feature, organization, ORG, PRODUCTION};
    use chrono::Utc;
    use ff_02_bucketing::{hash_fraction, hash_seed};
    use ff_04_rule_compiler::{CompileContext, RuleCompiler};
    use ff_07_sample_evaluator::{EvaluationSource, RuleOutcome};
    use proptest::prelude::*;
    use serde_json::json;
    use shared_types::{
        ConnectionCapabilities, ExperimentRef, Feature, HashVersion, Holdout, Prerequisite, Rule,
        RuleAction, Variation,
    };
    use std::collections::{BTreeMap, BTreeSet};

    const AUTHORED_IDS: [&str; 5] = ["", "dup", "holdout_H", "prereq_F", "r1"];

    fn compiled_rule_ids(rules: Vec<Rule>) -> Vec<String> {
        let org = organization();
        let features = vec![
            feature("F", json!("off"), rules)
                .with_prerequisite(Prerequisite::new("P", json!({"value": "off"}))),
            feature("P", json!("off"), vec![]),
        ];
        let holdouts = vec![Holdout::new("H")
            .with_environment(PRODUCTION)
            .with_feature("F")];
        let groups = BTreeMap::new();
        let environment = org.environment(PRODUCTION).expect("production exists");

        let ctx = CompileContext::new(environment, &org.environments, &features, &groups, &holdouts)
            .at(Utc::now());
        let compiled = RuleCompiler::new().compile_environment(&ctx);
        compiled.features["F"]
            .rules
            .iter()
            .filter_map(|r| r.id.clone())
            .collect()
    }

    proptest! {
        #[test]
        fn prop_rule_ids_unique_within_feature(
            picks in prop::collection::vec((0usize..AUTHORED_IDS.len(), 0u8..4), 0..10)
        ) {
            let rules: Vec<Rule> = picks
                .iter()
                .map(|(id, value)| {
                    Rule::force(AUTHORED_IDS[*id], json!(format!("v{value}")))
                        .with_condition(json!({"bucket": value}))
                })
                .collect();

            let ids = compiled_rule_ids(rules);
            // gate + holdout + every declared rule
            prop_assert_eq!(ids.len(), picks.len() + 2);
            prop_assert_eq!(ids.iter().collect::<BTreeSet<_>>().len(), ids.len());
        }
    }

    #[test]
    fn test_rule_ids_stable_across_recompilation() {
        let rules = || {
            vec![
                Rule::force("", json!("a")).with_condition(json!({"country": "US"})),
                Rule::force("", json!("b")),
            ]
        };
        assert_eq!(compiled_rule_ids(rules()), compiled_rule_ids(rules()));
    }

    // =========================================================================
    // COVERAGE BOUNDARY
    // =========================================================================

    #[tokio::test]
    async fn test_fraction_equal_to_coverage_is_excluded() {
        let fraction = hash_fraction(&hash_seed("F", "u1"), HashVersion::V1);
        let at_boundary = Rule::rollout("r-roll", json!("on"), fraction, "id");
        let engine = engine(vec![feature("F", json!("off"), vec![at_boundary])], vec![]).await;

        let result = engine
            .evaluate_for_sample(ORG, "F", PRODUCTION, &attributes(json!({"id": "u1"})))
            .await
            .unwrap();
        assert_eq!(result.value, json!("off"));
        assert!(matches!(result.trace[0].outcome, RuleOutcome::Excluded { .. }));

        let just_above = Rule::rollout("r-roll", json!("on"), (fraction + 0.001).min(1.0), "id");
        engine
            .save_feature(feature("F", json!("off"), vec![just_above]))
            .await
            .unwrap();
        let result = engine
            .evaluate_for_sample(ORG, "F", PRODUCTION, &attributes(json!({"id": "u1"})))
            .await
            .unwrap();
        assert_eq!(result.value, json!("on"));
        assert_eq!(result.source, EvaluationSource::Rollout);
    }

    // =========================================================================
    // HASH VERSIONS
    // =========================================================================

    #[tokio::test]
    async fn test_hash_versions_are_kept_per_rule() {
        let mut legacy = ExperimentRef::new(
            "exp-legacy",
            "legacy",
            vec![
                Variation::new("a", json!("a"), 0.5),
                Variation::new("b", json!("b"), 0.5),
            ],
        );
        legacy.hash_version = HashVersion::V1;
        let current = ExperimentRef::new(
            "exp-current",
            "current",
            vec![
                Variation::new("a", json!("a"), 0.5),
                Variation::new("b", json!("b"), 0.5),
            ],
        );
        let features: Vec<Feature> = vec![feature(
            "F",
            json!("off"),
            vec![
                Rule::experiment("r-legacy", legacy).with_condition(json!({"legacy": true})),
                Rule::experiment("r-current", current),
                Rule::rollout("r-roll", json!("on"), 0.5, "id"),
            ],
        )];
        let engine = engine(features, vec![]).await;

        for capabilities in [ConnectionCapabilities::default(), ConnectionCapabilities::full()] {
            let contents = engine
                .compile_feature_definitions(ORG, PRODUCTION, &[], &capabilities)
                .await
                .unwrap();
            let versions: Vec<HashVersion> = contents.features["F"]
                .rules
                .iter()
                .filter_map(|rule| match &rule.action {
                    RuleAction::Experiment(e) => Some(e.hash_version),
                    RuleAction::Rollout(r) => Some(r.hash_version),
                    _ => None,
                })
                .collect();
            assert_eq!(versions, vec![HashVersion::V1, HashVersion::V2, HashVersion::V1]);
        }
    }
}
