//! # Holdout Scoping
//!
//! A holdout only gates features it shares a project with, and a project
//! filter only sees holdouts that overlap it.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{engine, feature, ORG, PRODUCTION};
    use serde_json::json;
    use shared_types::{ConnectionCapabilities, Holdout, PayloadContents, ProjectId, Rule};

    const HOLDOUT_KEY: &str = "$holdout:H";

    fn wrapped_feature(project: &str) -> shared_types::Feature {
        feature(
            "feature-with-holdout",
            json!("off"),
            vec![Rule::force("r1", json!("on"))],
        )
        .with_project(project)
    }

    fn holdout(project: &str) -> Holdout {
        Holdout::new("H")
            .with_project(project)
            .with_environment(PRODUCTION)
            .with_feature("feature-with-holdout")
    }

    fn references_holdout(contents: &PayloadContents) -> bool {
        contents
            .features
            .values()
            .flat_map(|definition| definition.rules.iter())
            .any(|rule| rule.references_parent(HOLDOUT_KEY))
    }

    async fn definitions(
        engine: &flag_runtime::FlagEngine,
        filter: &[&str],
    ) -> PayloadContents {
        let filter: Vec<ProjectId> = filter.iter().map(|p| p.to_string()).collect();
        engine
            .compile_feature_definitions(ORG, PRODUCTION, &filter, &ConnectionCapabilities::full())
            .await
            .unwrap()
    }

    // =========================================================================
    // SCENARIO C: PROJECT FILTER
    // =========================================================================

    #[tokio::test]
    async fn test_project_filter_excludes_foreign_holdout() {
        let engine = engine(vec![wrapped_feature("p2")], vec![holdout("p2")]).await;

        let p1 = definitions(&engine, &["p1"]).await;
        assert!(!references_holdout(&p1));
        assert!(!p1.features.contains_key(HOLDOUT_KEY));
        assert!(p1.holdouts.is_empty());

        let both = definitions(&engine, &["p1", "p2"]).await;
        assert!(references_holdout(&both));
        assert!(both.features.contains_key(HOLDOUT_KEY));
        let rules = &both.features["feature-with-holdout"].rules;
        assert!(rules[0].references_parent(HOLDOUT_KEY));
        assert_eq!(rules.len(), 2);
    }

    // =========================================================================
    // PROJECT MISMATCH BETWEEN HOLDOUT AND FEATURE
    // =========================================================================

    #[tokio::test]
    async fn test_holdout_never_gates_feature_of_other_project() {
        let engine = engine(vec![wrapped_feature("p2")], vec![holdout("p1")]).await;

        let everything = definitions(&engine, &[]).await;
        let rules = &everything.features["feature-with-holdout"].rules;
        assert_eq!(rules.len(), 1);
        assert!(!references_holdout(&everything));
    }

    #[tokio::test]
    async fn test_unscoped_holdout_gates_every_wrapped_feature() {
        let unscoped = Holdout::new("H")
            .with_environment(PRODUCTION)
            .with_feature("feature-with-holdout");
        let engine = engine(vec![wrapped_feature("p2")], vec![unscoped]).await;

        let p2 = definitions(&engine, &["p2"]).await;
        assert!(references_holdout(&p2));
        assert!(p2.features.contains_key(HOLDOUT_KEY));
    }

    #[tokio::test]
    async fn test_holdout_disabled_in_environment_is_ignored() {
        let staging_only = Holdout::new("H")
            .with_project("p2")
            .with_environment("staging")
            .with_feature("feature-with-holdout");
        let engine = engine(vec![wrapped_feature("p2")], vec![staging_only]).await;

        let p2 = definitions(&engine, &["p2"]).await;
        assert!(!references_holdout(&p2));
    }
}
