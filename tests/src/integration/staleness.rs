//! # Staleness Priority Chain
//!
//! Classification through the engine, over features stored in the feature
//! store. Organization environments are production and staging; features
//! here only configure production, so staging always reads `no-rules`.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{engine, feature, ORG, PRODUCTION};
    use chrono::{Duration, Utc};
    use ff_06_staleness::StaleReason;
    use serde_json::json;
    use shared_types::{ExperimentRef, Feature, Prerequisite, Rule, Variation};

    fn aged(feature: Feature) -> Feature {
        feature.with_date_updated(Utc::now() - Duration::days(90))
    }

    fn one_sided(id: &str) -> Feature {
        aged(feature(id, json!("off"), vec![Rule::force("r1", json!("off"))]))
    }

    fn targeted(id: &str) -> Feature {
        aged(feature(
            id,
            json!("off"),
            vec![Rule::force("r1", json!("on")).with_condition(json!({"country": "US"}))],
        ))
    }

    #[tokio::test]
    async fn test_never_stale_beats_one_sided_rules() {
        let mut opted_out = one_sided("opted-out");
        opted_out.never_stale = true;
        let engine = engine(vec![opted_out, one_sided("plain")], vec![]).await;

        let report = engine.classify_staleness(ORG, "opted-out").await.unwrap();
        assert_eq!(report.reason, StaleReason::NeverStale);
        assert!(!report.stale);
        assert!(report
            .per_environment
            .values()
            .all(|e| e.reason == StaleReason::NeverStale));

        let report = engine.classify_staleness(ORG, "plain").await.unwrap();
        assert!(report.stale);
        assert_eq!(report.reason, StaleReason::RulesOneSided);
        assert_eq!(report.environment("staging").unwrap().reason, StaleReason::NoRules);
    }

    #[tokio::test]
    async fn test_dependents_keep_a_feature_alive() {
        let parent = one_sided("parent");
        let child = targeted("child").with_prerequisite(Prerequisite::new("parent", json!({"value": "off"})));
        let engine = engine(vec![parent, child], vec![]).await;

        let report = engine.classify_staleness(ORG, "parent").await.unwrap();
        assert_eq!(report.reason, StaleReason::HasDependents);
        assert!(!report.stale);
    }

    #[tokio::test]
    async fn test_recent_edit_is_never_stale() {
        let engine = engine(
            vec![feature("fresh", json!("off"), vec![Rule::force("r1", json!("off"))])],
            vec![],
        )
        .await;
        let report = engine.classify_staleness(ORG, "fresh").await.unwrap();
        assert_eq!(report.reason, StaleReason::RecentlyUpdated);
    }

    #[tokio::test]
    async fn test_lifecycle_links_follow_rule_shape() {
        let mut toggled = targeted("toggled");
        if let Some(env) = toggled.environments.get_mut(PRODUCTION) {
            env.enabled = false;
        }
        let experiment = ExperimentRef::new(
            "exp",
            "experimenting",
            vec![
                Variation::new("control", json!("off"), 0.5),
                Variation::new("treatment", json!("on"), 0.5),
            ],
        );
        let experimenting = aged(feature(
            "experimenting",
            json!("off"),
            vec![Rule::experiment("r1", experiment)],
        ));
        let engine = engine(vec![toggled, experimenting, targeted("live")], vec![]).await;

        let report = engine.classify_staleness(ORG, "toggled").await.unwrap();
        assert!(report.stale);
        assert_eq!(report.reason, StaleReason::ToggledOff);

        let report = engine.classify_staleness(ORG, "experimenting").await.unwrap();
        assert!(!report.stale);
        assert_eq!(report.reason, StaleReason::ActiveExperiment);

        let report = engine.classify_staleness(ORG, "live").await.unwrap();
        assert!(!report.stale);
        assert_eq!(report.reason, StaleReason::HasRules);

        assert_eq!(engine.classify_all(ORG).await.unwrap().len(), 3);
    }
}
