//! # Prerequisites Across Subsystems
//!
//! Cycle detection feeds the compiler, the payload and the staleness
//! classifier; acyclic prerequisites gate evaluation.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{attributes, boolean_flag, engine, feature, ORG, PRODUCTION};
    use ff_03_prerequisites::{build_graph, check_update, detect_cycle};
    use ff_05_payload_cache::PayloadCacheApi;
    use ff_06_staleness::StaleReason;
    use ff_07_sample_evaluator::{EvaluationSource, RuleOutcome};
    use flag_runtime::EngineError;
    use serde_json::{json, Value};
    use shared_types::{Feature, FeatureEnvironment, Prerequisite, Rule, ValueType};

    fn requires(feature: Feature, parent: &str) -> Feature {
        feature.with_prerequisite(Prerequisite::new(parent, json!({"value": true})))
    }

    fn cycle() -> Vec<Feature> {
        vec![
            requires(boolean_flag("A"), "B"),
            requires(boolean_flag("B"), "C"),
            requires(boolean_flag("C"), "A"),
        ]
    }

    // =========================================================================
    // CYCLE DETECTION
    // =========================================================================

    #[test]
    fn test_three_feature_cycle_is_detected() {
        let features = cycle();
        let path = detect_cycle(&build_graph(&features), "A").expect("A → B → C → A");
        for id in ["A", "B", "C"] {
            assert!(path.iter().any(|p| p == id));
        }
    }

    #[test]
    fn test_chain_is_not_a_cycle() {
        let features = vec![
            requires(boolean_flag("A"), "B"),
            requires(boolean_flag("B"), "C"),
            boolean_flag("C"),
        ];
        let graph = build_graph(&features);
        assert_eq!(detect_cycle(&graph, "A"), None);

        let closing = requires(boolean_flag("C"), "A");
        assert!(check_update(&features, &closing).is_err());
    }

    #[tokio::test]
    async fn test_cycle_is_omitted_from_payload_only_for_its_members() {
        let mut features = cycle();
        features.push(requires(boolean_flag("E"), "A"));
        features.push(boolean_flag("D"));
        let engine = engine(features, vec![]).await;

        let payload = engine.payload().compile_payload(ORG, PRODUCTION, &[]).await.unwrap();
        for id in ["A", "B", "C", "E"] {
            assert!(!payload.contents.features.contains_key(id), "{id} should be omitted");
            assert!(payload.errors[id].contains("→"));
        }
        assert!(payload.contents.features.contains_key("D"));
        assert!(!payload.errors.contains_key("D"));
    }

    #[tokio::test]
    async fn test_cycle_surfaces_in_staleness_and_sample_evaluation() {
        let engine = engine(cycle(), vec![]).await;

        let report = engine.classify_staleness(ORG, "B").await.unwrap();
        assert_eq!(report.reason, StaleReason::Error);
        let error = report.environment(PRODUCTION).and_then(|e| e.error.clone()).unwrap();
        assert!(error.contains("A") && error.contains("C"));

        let err = engine
            .evaluate_for_sample(ORG, "B", PRODUCTION, &attributes(json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FeatureExcluded { .. }));
    }

    // =========================================================================
    // GATING
    // =========================================================================

    #[tokio::test]
    async fn test_failing_feature_prerequisite_turns_feature_off() {
        let parent = Feature::new("parent", ORG, ValueType::Boolean, json!(false))
            .with_environment(PRODUCTION, FeatureEnvironment::new(true));
        let child = requires(
            feature("child", json!("off"), vec![Rule::force("r-on", json!("on"))]),
            "parent",
        );
        let engine = engine(vec![parent, child], vec![]).await;

        let result = engine
            .evaluate_for_sample(ORG, "child", PRODUCTION, &attributes(json!({"id": "u1"})))
            .await
            .unwrap();
        assert_eq!(result.value, Value::Null);
        assert_eq!(result.source, EvaluationSource::Prerequisite);

        engine.save_feature(boolean_flag("parent")).await.unwrap();
        let result = engine
            .evaluate_for_sample(ORG, "child", PRODUCTION, &attributes(json!({"id": "u1"})))
            .await
            .unwrap();
        assert_eq!(result.value, json!("on"));
        assert_eq!(result.source, EvaluationSource::Force);
    }

    #[tokio::test]
    async fn test_failing_rule_prerequisite_only_skips_the_rule() {
        let parent = Feature::new("parent", ORG, ValueType::Boolean, json!(false))
            .with_environment(PRODUCTION, FeatureEnvironment::new(true));
        let child = feature(
            "child",
            json!("off"),
            vec![
                Rule::force("r-vip", json!("vip"))
                    .with_prerequisite(Prerequisite::new("parent", json!({"value": true}))),
                Rule::force("r-base", json!("base")),
            ],
        );
        let engine = engine(vec![parent, child], vec![]).await;

        let result = engine
            .evaluate_for_sample(ORG, "child", PRODUCTION, &attributes(json!({"id": "u1"})))
            .await
            .unwrap();
        assert_eq!(result.value, json!("base"));
        assert_eq!(result.matched_rule_id.as_deref(), Some("r-base"));
        assert!(matches!(
            result.trace[0].outcome,
            RuleOutcome::ParentConditionFailed { .. }
        ));
    }
}
