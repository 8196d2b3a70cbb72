//! Reconciliation sweep.
//!
//! The queue's retry path marks drafts failed when their job exhausts its
//! attempts, but an execution can also vanish without reporting back: the
//! hosting environment kills a runner past its wall-clock ceiling, or a
//! process dies mid-upload. This sweep releases those abandoned claims and
//! fails drafts stuck in `progress` with no live job left to finish them.

use chrono::Utc;
use postline_core::{DraftId, Error, Result, UserId};
use postline_db::DraftRepo;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::queue::DelayQueue;
use crate::store::JobStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Abandoned claims returned to pending.
    pub released_jobs: u64,
    /// Drafts moved from `progress` to `failed`.
    pub failed_drafts: usize,
}

pub struct Reconciler {
    drafts: Arc<dyn DraftRepo>,
    queue: Arc<dyn DelayQueue>,
    store: Arc<dyn JobStore>,
    sweep_interval: Duration,
    stuck_after: Duration,
}

impl Reconciler {
    pub fn new(
        drafts: Arc<dyn DraftRepo>,
        queue: Arc<dyn DelayQueue>,
        store: Arc<dyn JobStore>,
        sweep_interval: Duration,
        stuck_after: Duration,
    ) -> Self {
        Self {
            drafts,
            queue,
            store,
            sweep_interval,
            stuck_after,
        }
    }

    /// Run sweeps forever.
    pub async fn run(&self) {
        info!(interval = ?self.sweep_interval, "Starting reconciler");
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.sweep_once().await {
                Ok(report) if report != SweepReport::default() => {
                    info!(
                        released_jobs = report.released_jobs,
                        failed_drafts = report.failed_drafts,
                        "Reconciliation sweep finished"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Reconciliation sweep failed"),
            }
        }
    }

    /// One pass over abandoned claims and stuck drafts.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let released_jobs = self
            .queue
            .release_stale(self.stuck_after)
            .await
            .map_err(|e| Error::QueueUnavailable(e.to_string()))?;

        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.stuck_after)
                .map_err(|e| Error::Internal(e.to_string()))?;

        let mut failed_drafts = 0;
        for draft in self.drafts.find_stuck_in_progress(cutoff).await? {
            let owner = UserId::from(draft.owner_id.clone());
            let draft_id = DraftId::from(draft.id.clone());

            if self.has_live_job(&owner, &draft_id).await {
                continue;
            }

            warn!(
                draft_id = %draft_id,
                owner_id = %owner,
                "Draft stuck in progress with no live job; marking failed"
            );
            self.drafts.mark_failed(&owner, &draft_id).await?;
            failed_drafts += 1;
        }

        Ok(SweepReport {
            released_jobs,
            failed_drafts,
        })
    }

    async fn has_live_job(&self, owner: &UserId, draft_id: &DraftId) -> bool {
        let handle = match self.store.get(owner, draft_id).await {
            Ok(handle) => handle,
            Err(e) => {
                // Can't tell; leave the draft alone until the store is back.
                warn!(draft_id = %draft_id, error = %e, "Job store unreachable during sweep");
                return true;
            }
        };

        let Some(job_id) = handle else { return false };
        match self.queue.get_job(job_id).await {
            Ok(Some(job)) => job.status != "failed",
            Ok(None) => false,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Queue unreachable during sweep");
                true
            }
        }
    }
}
