//! # Concurrent Writers and Readers
//!
//! Refreshes of one (organization, environment) are serialized and the
//! newest requested generation always wins. Readers only ever observe whole,
//! deployed payloads.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{boolean_flag, engine, ORG, PRODUCTION};
    use ff_05_payload_cache::{cache_key, PayloadCacheApi};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_newest_generation_wins() {
        let engine = engine(vec![boolean_flag("banner")], vec![]).await;
        let payload = engine.payload().clone();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let payload = payload.clone();
                tokio::spawn(async move { payload.refresh_environment(ORG, PRODUCTION).await })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_committed() {
                committed += 1;
            }
        }
        assert!(committed >= 1);

        let key = cache_key(ORG, PRODUCTION);
        let cached = payload.cache().get(&key).unwrap();
        assert_eq!(cached.generation, payload.cache().latest_requested(&key));
        assert!(cached.deployed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_partial_payloads() {
        let engine = engine(vec![boolean_flag("seed")], vec![]).await;
        engine.refresh(ORG, PRODUCTION).await.unwrap();
        let payload = engine.payload().clone();
        let done = Arc::new(AtomicBool::new(false));

        let reader = {
            let payload = payload.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut last_generation = 0;
                let mut reads = 0;
                while !done.load(Ordering::Acquire) {
                    let current = payload.get(ORG, PRODUCTION).await.unwrap().unwrap();
                    assert!(current.deployed);
                    assert!(current.generation >= last_generation);
                    assert!(current.contents.features.contains_key("seed"));
                    last_generation = current.generation;
                    reads += 1;
                    tokio::task::yield_now().await;
                }
                reads
            })
        };

        for i in 0..20 {
            engine.save_feature(boolean_flag(&format!("flag-{i}"))).await.unwrap();
            engine.refresh(ORG, PRODUCTION).await.unwrap();
        }
        done.store(true, Ordering::Release);

        assert!(reader.await.unwrap() > 0);
        let last = payload.get(ORG, PRODUCTION).await.unwrap().unwrap();
        assert_eq!(last.contents.features.len(), 21);
    }

    #[tokio::test]
    async fn test_burst_of_edits_converges_through_the_worker() {
        let engine = engine(vec![], vec![]).await;
        let workers = engine.start();

        for i in 0..20 {
            engine.save_feature(boolean_flag(&format!("flag-{i}"))).await.unwrap();
        }

        let mut converged = false;
        for _ in 0..100 {
            if let Some(payload) = engine.cached_payload(ORG, PRODUCTION).await.unwrap() {
                if payload.contents.features.len() == 20 {
                    converged = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(converged);

        let processed = engine.shutdown(workers).await;
        assert!((1..=20).contains(&processed));
    }
}
