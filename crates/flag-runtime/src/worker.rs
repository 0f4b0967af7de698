//! # Refresh Worker
//!
//! Drains the refresh queue and recompiles the environments each job names.
//! A committed payload that reports a `next_scheduled_update` gets a
//! follow-up job queued for that instant, so scheduled rules switch on and
//! off without an edit.

use std::sync::Arc;

use chrono::Utc;
use ff_05_payload_cache::{
    cache_key, PayloadCacheApi, PayloadService, RefreshJob, RefreshOutcome, RefreshQueue,
};
use shared_types::PayloadKey;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct RefreshWorker {
    payload: Arc<PayloadService>,
    queue: Arc<dyn RefreshQueue>,
}

impl RefreshWorker {
    pub fn new(payload: Arc<PayloadService>, queue: Arc<dyn RefreshQueue>) -> Self {
        Self { payload, queue }
    }

    /// Run one job. Failures are logged; the job is not retried.
    pub async fn process(&self, job: &RefreshJob) -> Vec<RefreshOutcome> {
        let outcomes = match self.payload.run_job(job).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!(job_id = %job.id, organization = %job.organization, error = %e, "Refresh job failed");
                return Vec::new();
            }
        };

        for outcome in &outcomes {
            match outcome {
                RefreshOutcome::Committed { environment, generation } => {
                    debug!(job_id = %job.id, environment = %environment, generation, "Payload committed");
                    self.schedule_follow_up(job, environment);
                }
                RefreshOutcome::Superseded { environment, generation, latest } => {
                    debug!(
                        job_id = %job.id,
                        environment = %environment,
                        generation,
                        latest,
                        "Refresh superseded"
                    );
                }
            }
        }
        outcomes
    }

    /// Consume the queue until it is closed and drained. Resolves to the
    /// number of jobs processed.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut processed = 0;
            while let Some(job) = self.queue.dequeue().await {
                self.process(&job).await;
                processed += 1;
            }
            info!(processed, "Refresh worker stopped");
            processed
        })
    }

    fn schedule_follow_up(&self, job: &RefreshJob, environment: &str) {
        let Some(payload) = self.payload.cache().get(&cache_key(&job.organization, environment))
        else {
            return;
        };
        let Some(at) = payload.next_scheduled_update else {
            return;
        };
        let Ok(delay) = (at - Utc::now()).to_std() else {
            return;
        };

        let follow_up = RefreshJob::new(
            job.organization.clone(),
            [PayloadKey::new(environment, None)].into(),
            job.affected_connections.clone(),
        );
        debug!(
            organization = %job.organization,
            environment = %environment,
            at = %at,
            "Scheduled refresh planned"
        );
        let queue = self.queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.enqueue(follow_up).await {
                debug!(error = %e, "Scheduled refresh dropped");
            }
        });
    }
}
