//! In-memory queue and store backends.
//!
//! Used for embedded single-process deployments and for tests. Due times
//! are tracked on the tokio clock, so a paused test clock can fast-forward
//! through hours of schedule without waiting.

use async_trait::async_trait;
use chrono::Utc;
use postline_core::{DraftId, JobId, UserId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::queue::{DelayQueue, JobFate, JobOptions, QueuedJob};
use crate::store::JobStore;
use crate::{QueueError, StoreError};

struct MemoryJob {
    job: QueuedJob,
    due: Instant,
}

/// In-memory delay queue with the same delivery semantics as the Postgres
/// implementation: single claim per due job, removal on success, retention
/// of exhausted jobs.
#[derive(Default)]
pub struct InMemoryDelayQueue {
    jobs: Mutex<HashMap<uuid::Uuid, MemoryJob>>,
}

impl InMemoryDelayQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DelayQueue for InMemoryDelayQueue {
    async fn enqueue(
        &self,
        kind: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<QueuedJob, QueueError> {
        let delay = options
            .delay
            .to_std()
            .map_err(|_| QueueError::InvalidSchedule)?;

        let job = QueuedJob {
            id: uuid::Uuid::now_v7(),
            kind: kind.to_string(),
            payload,
            run_at: Utc::now() + options.delay,
            attempts: 0,
            max_attempts: options.max_attempts as i32,
            backoff_ms: options.backoff.as_millis() as i64,
            status: "pending".to_string(),
            last_error: None,
            claimed_by: None,
            claimed_at: None,
            created_at: Utc::now(),
        };

        self.jobs.lock().unwrap().insert(
            job.id,
            MemoryJob {
                job: job.clone(),
                due: Instant::now() + delay,
            },
        );
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(id.as_uuid())
            .map(|entry| entry.job.clone()))
    }

    async fn remove(&self, id: JobId) -> Result<bool, QueueError> {
        let mut jobs = self.jobs.lock().unwrap();
        let removable = jobs
            .get(id.as_uuid())
            .is_some_and(|entry| entry.job.status == "pending");
        if removable {
            jobs.remove(id.as_uuid());
        }
        Ok(removable)
    }

    async fn claim_due(&self, worker_id: &str) -> Result<Option<QueuedJob>, QueueError> {
        let now = Instant::now();
        let mut jobs = self.jobs.lock().unwrap();

        let next = jobs
            .values()
            .filter(|entry| entry.job.status == "pending" && entry.due <= now)
            .min_by_key(|entry| entry.due)
            .map(|entry| entry.job.id);

        let Some(id) = next else { return Ok(None) };
        let entry = jobs.get_mut(&id).unwrap();
        entry.job.status = "running".to_string();
        entry.job.claimed_by = Some(worker_id.to_string());
        entry.job.claimed_at = Some(Utc::now());
        Ok(Some(entry.job.clone()))
    }

    async fn complete(&self, id: JobId) -> Result<(), QueueError> {
        self.jobs.lock().unwrap().remove(id.as_uuid());
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<JobFate, QueueError> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(entry) = jobs.get_mut(id.as_uuid()) else {
            return Ok(JobFate::Exhausted);
        };

        let backoff = Duration::from_millis(entry.job.backoff_ms as u64)
            * 2u32.pow(entry.job.attempts as u32);
        entry.job.attempts += 1;
        entry.job.last_error = Some(error.to_string());
        entry.job.claimed_by = None;
        entry.job.claimed_at = None;

        if entry.job.attempts >= entry.job.max_attempts {
            entry.job.status = "failed".to_string();
            Ok(JobFate::Exhausted)
        } else {
            entry.job.status = "pending".to_string();
            entry.due = Instant::now() + backoff;
            entry.job.run_at = Utc::now()
                + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::zero());
            Ok(JobFate::Retrying {
                attempt: entry.job.attempts as u32,
            })
        }
    }

    async fn discard(&self, id: JobId, error: &str) -> Result<(), QueueError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(entry) = jobs.get_mut(id.as_uuid()) {
            entry.job.status = "failed".to_string();
            entry.job.attempts += 1;
            entry.job.last_error = Some(error.to_string());
            entry.job.claimed_by = None;
            entry.job.claimed_at = None;
        }
        Ok(())
    }

    async fn release_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).unwrap_or_else(|_| chrono::Duration::zero());
        let mut released = 0;
        let mut jobs = self.jobs.lock().unwrap();
        for entry in jobs.values_mut() {
            if entry.job.status == "running"
                && entry.job.claimed_at.is_some_and(|at| at < cutoff)
            {
                entry.job.status = "pending".to_string();
                entry.job.claimed_by = None;
                entry.job.claimed_at = None;
                entry.due = Instant::now();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn list_pending(&self, kind: &str) -> Result<Vec<QueuedJob>, QueueError> {
        let jobs = self.jobs.lock().unwrap();
        let mut pending: Vec<_> = jobs
            .values()
            .filter(|entry| entry.job.kind == kind && entry.job.status == "pending")
            .map(|entry| (entry.due, entry.job.clone()))
            .collect();
        pending.sort_by_key(|(due, _)| *due);
        Ok(pending.into_iter().map(|(_, job)| job).collect())
    }
}

/// In-memory job-handle store.
#[derive(Default)]
pub struct InMemoryJobStore {
    handles: Mutex<HashMap<(String, String), JobId>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(owner: &UserId, draft: &DraftId) -> (String, String) {
        (owner.as_str().to_string(), draft.as_str().to_string())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, owner: &UserId, draft: &DraftId) -> Result<Option<JobId>, StoreError> {
        Ok(self
            .handles
            .lock()
            .unwrap()
            .get(&Self::key(owner, draft))
            .copied())
    }

    async fn swap(
        &self,
        owner: &UserId,
        draft: &DraftId,
        job: JobId,
    ) -> Result<Option<JobId>, StoreError> {
        Ok(self
            .handles
            .lock()
            .unwrap()
            .insert(Self::key(owner, draft), job))
    }

    async fn take(&self, owner: &UserId, draft: &DraftId) -> Result<Option<JobId>, StoreError> {
        Ok(self
            .handles
            .lock()
            .unwrap()
            .remove(&Self::key(owner, draft)))
    }

    async fn remove_if(
        &self,
        owner: &UserId,
        draft: &DraftId,
        job: JobId,
    ) -> Result<bool, StoreError> {
        let mut handles = self.handles.lock().unwrap();
        let key = Self::key(owner, draft);
        if handles.get(&key) == Some(&job) {
            handles.remove(&key);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
