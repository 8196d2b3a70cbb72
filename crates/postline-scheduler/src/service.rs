//! Schedule and cancel operations.

use chrono::{DateTime, Utc};
use postline_core::schedule::ScheduleTime;
use postline_core::{DraftId, Error, Identity, JobId, PublishJob, Result, job::PUBLISH_JOB_KIND};
use postline_db::DraftRepo;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::queue::{DelayQueue, JobOptions};
use crate::store::JobStore;
use crate::QueueError;

/// Retry policy applied to every publish job this service enqueues.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// A request to publish a draft at a future instant.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub draft_id: DraftId,
    /// RFC 3339, or a naive local timestamp interpreted in `time_zone`.
    pub scheduled_at: String,
    /// IANA zone name.
    pub time_zone: String,
    pub name: String,
    /// Draft body; falls back to the stored draft when absent.
    pub content: Option<String>,
    pub media_url: Option<String>,
}

/// Confirmation returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReceipt {
    pub job_id: JobId,
    pub scheduled_for: DateTime<Utc>,
    pub time_zone: String,
}

/// Schedules and cancels delayed publishes.
///
/// All collaborators are injected, so handlers and tests construct this
/// against whichever queue/store/repository backends they need.
pub struct Scheduler {
    queue: Arc<dyn DelayQueue>,
    store: Arc<dyn JobStore>,
    drafts: Arc<dyn DraftRepo>,
    retry: RetryPolicy,
}

impl Scheduler {
    pub fn new(
        queue: Arc<dyn DelayQueue>,
        store: Arc<dyn JobStore>,
        drafts: Arc<dyn DraftRepo>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            store,
            drafts,
            retry,
        }
    }

    /// Schedule a draft for publishing, superseding any pending schedule
    /// for the same draft.
    ///
    /// Validation happens before any mutation: a rejected request leaves
    /// no trace in the queue, the store, or the database.
    pub async fn schedule(
        &self,
        identity: &Identity,
        request: ScheduleRequest,
    ) -> Result<ScheduleReceipt> {
        let when = ScheduleTime::parse(&request.scheduled_at, &request.time_zone)?;

        let existing = self.drafts.get(&identity.owner, &request.draft_id).await?;
        let has_content = request
            .content
            .as_deref()
            .is_some_and(|content| !content.trim().is_empty())
            || existing
                .as_ref()
                .is_some_and(|draft| !draft.content.trim().is_empty());
        if !has_content {
            return Err(Error::EmptyContent);
        }

        self.drafts
            .upsert(
                &identity.owner,
                identity.workspace.as_ref(),
                &request.draft_id,
                &request.name,
                request.content.as_deref(),
                request.media_url.as_deref(),
            )
            .await?;

        let payload = serde_json::to_value(PublishJob::new(
            identity.owner.clone(),
            request.draft_id.clone(),
        ))
        .map_err(|e| Error::Internal(e.to_string()))?;

        let job = self
            .queue
            .enqueue(
                PUBLISH_JOB_KIND,
                payload,
                JobOptions {
                    delay: when.delay_from_now(),
                    max_attempts: self.retry.max_attempts,
                    backoff: self.retry.backoff,
                },
            )
            .await
            .map_err(queue_error)?;

        // The swap is atomic: whichever of two concurrent schedules lands
        // second sees the other's job here and cancels it, leaving exactly
        // one live job per draft.
        let superseded = self
            .store
            .swap(&identity.owner, &request.draft_id, job.job_id())
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        if let Some(old) = superseded.filter(|old| *old != job.job_id()) {
            match self.queue.remove(old).await {
                Ok(true) => debug!(job_id = %old, "Cancelled superseded job"),
                Ok(false) => debug!(job_id = %old, "Superseded job already gone"),
                Err(e) => warn!(job_id = %old, error = %e, "Failed to cancel superseded job"),
            }
        }

        self.drafts
            .mark_scheduled(
                &identity.owner,
                &request.draft_id,
                when.at,
                when.time_zone.name(),
                &request.name,
            )
            .await?;

        info!(
            draft_id = %request.draft_id,
            owner_id = %identity.owner,
            job_id = %job.id,
            scheduled_for = %when.at,
            "Draft scheduled"
        );

        Ok(ScheduleReceipt {
            job_id: job.job_id(),
            scheduled_for: when.at,
            time_zone: when.time_zone.name().to_string(),
        })
    }

    /// Cancel a pending schedule and return the draft to `saved`.
    ///
    /// Cancelling a draft with no active schedule succeeds as a no-op;
    /// cancelling a draft that does not exist is `NotFound`. A job already
    /// claimed by a runner cannot be stopped, but its stale schedule
    /// fields are still cleared.
    pub async fn cancel(&self, identity: &Identity, draft_id: &DraftId) -> Result<()> {
        if self.drafts.get(&identity.owner, draft_id).await?.is_none() {
            return Err(Error::NotFound(format!("draft {draft_id}")));
        }

        let handle = self
            .store
            .take(&identity.owner, draft_id)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        if let Some(job_id) = handle {
            match self.queue.remove(job_id).await {
                Ok(true) => debug!(job_id = %job_id, "Removed pending job"),
                Ok(false) => debug!(job_id = %job_id, "Job already fired or removed"),
                Err(e) => warn!(job_id = %job_id, error = %e, "Failed to remove job"),
            }
        }

        self.drafts.clear_schedule(&identity.owner, draft_id).await?;

        info!(draft_id = %draft_id, owner_id = %identity.owner, "Schedule cancelled");
        Ok(())
    }
}

fn queue_error(err: QueueError) -> Error {
    match err {
        QueueError::InvalidSchedule => {
            Error::PastSchedule("scheduled time already elapsed".to_string())
        }
        other => Error::QueueUnavailable(other.to_string()),
    }
}
