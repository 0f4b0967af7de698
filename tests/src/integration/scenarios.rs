//! # End-to-End Scenarios
//!
//! A feature is stored, compiled for an environment and evaluated for a
//! sample user through the engine facade, the way the debugging UI does it.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{attributes, engine, feature, ORG, PRODUCTION};
    use ff_02_bucketing::{choose_variation, hash_fraction, hash_seed};
    use ff_07_sample_evaluator::{EvaluationError, EvaluationSource, RuleOutcome};
    use flag_runtime::EngineError;
    use serde_json::json;
    use shared_types::{ExperimentRef, HashVersion, Rule, Variation};

    // =========================================================================
    // SCENARIO A: UNCONDITIONAL FORCE RULE
    // =========================================================================

    #[tokio::test]
    async fn test_force_rule_wins_for_any_attributes() {
        let engine = engine(
            vec![feature("F", json!("off"), vec![Rule::force("r-on", json!("on"))])],
            vec![],
        )
        .await;

        for sample in [
            json!({}),
            json!({"id": "u1"}),
            json!({"id": "u2", "country": "DE", "plan": {"tier": "pro"}}),
        ] {
            let result = engine
                .evaluate_for_sample(ORG, "F", PRODUCTION, &attributes(sample))
                .await
                .unwrap();
            assert_eq!(result.value, json!("on"));
            assert_eq!(result.source, EvaluationSource::Force);
            assert_eq!(result.matched_rule_id.as_deref(), Some("r-on"));
        }
    }

    #[tokio::test]
    async fn test_disabled_environment_leaves_feature_out() {
        let mut f = feature("F", json!("off"), vec![Rule::force("r-on", json!("on"))]);
        if let Some(env) = f.environments.get_mut(PRODUCTION) {
            env.enabled = false;
        }
        let engine = engine(vec![f], vec![]).await;

        let err = engine
            .evaluate_for_sample(ORG, "F", PRODUCTION, &attributes(json!({"id": "u1"})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Evaluation(EvaluationError::UnknownFeature { .. })
        ));
    }

    // =========================================================================
    // SCENARIO B: EXPERIMENT ASSIGNMENT MATCHES DIRECT BUCKETING
    // =========================================================================

    #[tokio::test]
    async fn test_experiment_assignment_matches_direct_computation() {
        let experiment = ExperimentRef::new(
            "exp-F",
            "F",
            vec![
                Variation::new("control", json!("control"), 0.5),
                Variation::new("treatment", json!("treatment"), 0.5),
            ],
        );
        assert_eq!(experiment.hash_version, HashVersion::V2);
        let engine = engine(
            vec![feature("F", json!("off"), vec![Rule::experiment("r-exp", experiment)])],
            vec![],
        )
        .await;

        let result = engine
            .evaluate_for_sample(ORG, "F", PRODUCTION, &attributes(json!({"id": "u1"})))
            .await
            .unwrap();

        let expected = choose_variation(hash_fraction(&hash_seed("F", "u1"), HashVersion::V2), &[0.5, 0.5])
            .expect("full coverage always assigns");
        let assignment = result.experiment.expect("user is in the experiment");
        assert_eq!(result.source, EvaluationSource::Experiment);
        assert_eq!(assignment.variation_index, expected);
        assert_eq!(assignment.hash_value, "u1");
        assert!(!assignment.sticky);
        assert_eq!(result.value, [json!("control"), json!("treatment")][expected]);
    }

    #[tokio::test]
    async fn test_experiment_without_hash_attribute_falls_through() {
        let experiment = ExperimentRef::new(
            "exp-F",
            "F",
            vec![
                Variation::new("control", json!("control"), 0.5),
                Variation::new("treatment", json!("treatment"), 0.5),
            ],
        );
        let engine = engine(
            vec![feature("F", json!("off"), vec![Rule::experiment("r-exp", experiment)])],
            vec![],
        )
        .await;

        let result = engine
            .evaluate_for_sample(ORG, "F", PRODUCTION, &attributes(json!({"country": "US"})))
            .await
            .unwrap();
        assert_eq!(result.value, json!("off"));
        assert_eq!(result.source, EvaluationSource::DefaultValue);
        assert!(matches!(
            result.trace[0].outcome,
            RuleOutcome::MissingHashAttribute { .. }
        ));
    }

    #[tokio::test]
    async fn test_sample_evaluation_never_writes_sticky_assignments() {
        let experiment = ExperimentRef::new(
            "exp-F",
            "F",
            vec![
                Variation::new("control", json!("control"), 0.5),
                Variation::new("treatment", json!("treatment"), 0.5),
            ],
        );
        let engine = engine(
            vec![feature("F", json!("off"), vec![Rule::experiment("r-exp", experiment)])],
            vec![],
        )
        .await;

        for id in ["u1", "u2", "u3"] {
            engine
                .evaluate_for_sample(ORG, "F", PRODUCTION, &attributes(json!({"id": id})))
                .await
                .unwrap();
        }
        assert!(engine.sticky_store().is_empty());
    }
}
