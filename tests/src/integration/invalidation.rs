//! # Non-Feature Invalidation
//!
//! Saved-group, holdout and organization edits reach the cached payload
//! through the running listener and worker, the same way feature edits do.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{engine, feature, organization, ORG, PRODUCTION};
    use flag_runtime::FlagEngine;
    use serde_json::json;
    use shared_types::{
        ConnectionCapabilities, Holdout, HoldoutStatus, Rule, SavedGroup, SavedGroupMatch,
        SavedGroupTargeting, SdkPayload,
    };
    use std::sync::Arc;
    use std::time::Duration;

    /// Fill the cache for production the way a first SDK request would.
    async fn warm(engine: &FlagEngine) -> Arc<SdkPayload> {
        engine
            .compile_feature_definitions(ORG, PRODUCTION, &[], &ConnectionCapabilities::full())
            .await
            .unwrap();
        engine
            .cached_payload(ORG, PRODUCTION)
            .await
            .unwrap()
            .expect("cache filled on first read")
    }

    async fn wait_for_cached(
        engine: &FlagEngine,
        accept: impl Fn(&SdkPayload) -> bool,
    ) -> Arc<SdkPayload> {
        let mut last = None;
        for _ in 0..50 {
            if let Some(payload) = engine.cached_payload(ORG, PRODUCTION).await.unwrap() {
                if accept(&payload) {
                    return payload;
                }
                last = Some(payload);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("cached payload never updated: {:?}", last.map(|p| p.generation));
    }

    #[tokio::test]
    async fn test_saved_group_edit_refreshes_cache() {
        let targeted = feature(
            "beta-banner",
            json!("off"),
            vec![Rule::force("r-beta", json!("on")).with_saved_groups(SavedGroupTargeting::new(
                SavedGroupMatch::Any,
                vec!["beta".into()],
            ))],
        );
        let engine = engine(vec![targeted], vec![]).await;
        engine
            .save_saved_group(ORG, SavedGroup::list("beta", "id", vec!["u1".into()]))
            .await;
        let before = warm(&engine).await;
        assert_eq!(before.contents.saved_groups["beta"], vec!["u1".to_string()]);

        let workers = engine.start();
        engine
            .save_saved_group(
                ORG,
                SavedGroup::list("beta", "id", vec!["u1".into(), "u2".into()]),
            )
            .await;

        let after = wait_for_cached(&engine, |p| p.contents.saved_groups["beta"].len() == 2).await;
        assert!(after.generation > before.generation);
        assert!(engine.shutdown(workers).await >= 1);
    }

    #[tokio::test]
    async fn test_stopping_holdout_refreshes_cache() {
        let holdout = Holdout::new("H")
            .with_environment(PRODUCTION)
            .with_feature("checkout");
        let engine = engine(
            vec![feature("checkout", json!("off"), vec![Rule::force("r1", json!("on"))])],
            vec![holdout.clone()],
        )
        .await;
        let before = warm(&engine).await;
        assert!(before.contents.holdouts.contains_key("H"));

        let workers = engine.start();
        let mut stopped = holdout;
        stopped.status = HoldoutStatus::Stopped;
        engine.save_holdout(ORG, stopped).await;

        let after = wait_for_cached(&engine, |p| p.contents.holdouts.is_empty()).await;
        assert!(!after.contents.features.contains_key("$holdout:H"));
        assert!(engine.shutdown(workers).await >= 1);
    }

    #[tokio::test]
    async fn test_environment_settings_edit_refreshes_cache() {
        let engine = engine(
            vec![
                feature("checkout", json!("off"), vec![]).with_project("p1"),
                feature("search", json!("off"), vec![]).with_project("p2"),
            ],
            vec![],
        )
        .await;
        let before = warm(&engine).await;
        assert_eq!(before.contents.features.len(), 2);

        let workers = engine.start();
        let mut restricted = organization();
        restricted.environments[0].projects = vec!["p2".into()];
        engine.save_organization(restricted).await;

        let after = wait_for_cached(&engine, |p| !p.contents.features.contains_key("checkout")).await;
        assert!(after.contents.features.contains_key("search"));
        assert!(engine.shutdown(workers).await >= 1);
    }

    #[tokio::test]
    async fn test_unchanged_organization_queues_nothing() {
        let engine = engine(vec![feature("checkout", json!("off"), vec![])], vec![]).await;
        let before = warm(&engine).await;

        let workers = engine.start();
        engine.save_organization(organization()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let cached = engine.cached_payload(ORG, PRODUCTION).await.unwrap().unwrap();
        assert_eq!(cached.generation, before.generation);
        assert_eq!(engine.shutdown(workers).await, 0);
    }
}
