//! Runner that claims due jobs and dispatches them to handlers.

use async_trait::async_trait;
use postline_core::JobId;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::queue::{DelayQueue, JobFate, QueuedJob};

/// How a handler failed.
///
/// Permanent failures skip the queue's remaining retries; retryable ones
/// go back through the backoff schedule.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("permanent: {0}")]
    Permanent(String),

    #[error("{0}")]
    Retryable(String),
}

/// Executes one kind of queued job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn handle(&self, job: &QueuedJob) -> Result<(), HandlerError>;
}

/// A runner that claims and executes due jobs.
///
/// Several runners may share one queue; SKIP LOCKED claiming keeps each
/// job on a single runner. The idle poll is jittered so a fleet of
/// runners does not hammer the queue in lockstep.
pub struct JobRunner {
    id: String,
    queue: Arc<dyn DelayQueue>,
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
    poll_interval: Duration,
    poll_jitter: Duration,
}

impl JobRunner {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn DelayQueue>,
        poll_interval: Duration,
        poll_jitter: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            handlers: HashMap::new(),
            poll_interval,
            poll_jitter,
        }
    }

    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    fn idle_sleep(&self) -> Duration {
        let jitter_ms = self.poll_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.poll_interval;
        }
        self.poll_interval + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }

    /// Run the claim/dispatch loop.
    pub async fn run(&self) {
        info!(runner_id = %self.id, "Starting job runner");

        loop {
            match self.queue.claim_due(&self.id).await {
                Ok(Some(job)) => self.dispatch(job).await,
                Ok(None) => sleep(self.idle_sleep()).await,
                Err(e) => {
                    warn!(runner_id = %self.id, error = %e, "Failed to claim job");
                    sleep(self.idle_sleep()).await;
                }
            }
        }
    }

    async fn dispatch(&self, job: QueuedJob) {
        let job_id = job.job_id();

        let Some(handler) = self.handlers.get(job.kind.as_str()) else {
            error!(job_id = %job_id, kind = %job.kind, "No handler registered for job kind");
            self.finish_discarded(job_id, "no handler registered").await;
            return;
        };

        info!(
            job_id = %job_id,
            kind = %job.kind,
            attempt = job.attempts + 1,
            max_attempts = job.max_attempts,
            "Executing job"
        );

        match handler.handle(&job).await {
            Ok(()) => {
                if let Err(e) = self.queue.complete(job_id).await {
                    warn!(job_id = %job_id, error = %e, "Failed to remove completed job");
                }
            }
            Err(HandlerError::Permanent(message)) => {
                error!(job_id = %job_id, error = %message, "Job failed permanently");
                self.finish_discarded(job_id, &message).await;
            }
            Err(HandlerError::Retryable(message)) => {
                match self.queue.fail(job_id, &message).await {
                    Ok(JobFate::Retrying { attempt }) => {
                        warn!(job_id = %job_id, attempt, error = %message, "Job failed, will retry");
                    }
                    Ok(JobFate::Exhausted) => {
                        error!(job_id = %job_id, error = %message, "Job exhausted its attempts; retained for inspection");
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "Failed to record job failure");
                    }
                }
            }
        }
    }

    async fn finish_discarded(&self, job_id: JobId, message: &str) {
        if let Err(e) = self.queue.discard(job_id, message).await {
            warn!(job_id = %job_id, error = %e, "Failed to discard job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDelayQueue;
    use crate::queue::JobOptions;

    struct StubHandler {
        result: fn() -> Result<(), HandlerError>,
    }

    #[async_trait]
    impl JobHandler for StubHandler {
        fn kind(&self) -> &'static str {
            "stub"
        }

        async fn handle(&self, _job: &QueuedJob) -> Result<(), HandlerError> {
            (self.result)()
        }
    }

    async fn run_one(
        queue: Arc<InMemoryDelayQueue>,
        result: fn() -> Result<(), HandlerError>,
    ) -> JobId {
        let job = queue
            .enqueue("stub", serde_json::json!({}), JobOptions::default())
            .await
            .unwrap();

        let runner = JobRunner::new(
            "runner-test",
            queue.clone(),
            Duration::from_millis(5),
            Duration::ZERO,
        )
        .register(Arc::new(StubHandler { result }));
        let task = tokio::spawn(async move { runner.run().await });

        // Give the runner a few polls to pick the job up.
        for _ in 0..200 {
            let state = queue.get_job(job.job_id()).await.unwrap();
            match state {
                Some(j) if j.status == "running" || j.status == "pending" => {
                    sleep(Duration::from_millis(5)).await;
                }
                _ => break,
            }
        }
        task.abort();
        job.job_id()
    }

    #[tokio::test]
    async fn successful_jobs_are_removed() {
        let queue = Arc::new(InMemoryDelayQueue::new());
        let id = run_one(queue.clone(), || Ok(())).await;
        assert!(queue.get_job(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn permanent_failures_discard_the_job_immediately() {
        let queue = Arc::new(InMemoryDelayQueue::new());
        let id = run_one(queue.clone(), || {
            Err(HandlerError::Permanent("no credentials".to_string()))
        })
        .await;

        let job = queue.get_job(id).await.unwrap().expect("job retained");
        assert_eq!(job.status, "failed");
        // One attempt was burned; the rest were skipped.
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("no credentials"));
    }
}
