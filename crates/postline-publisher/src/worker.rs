//! Publish worker: executes one queued publish end to end.

use async_trait::async_trait;
use postline_core::{PublishJob, WorkspaceId, job::PUBLISH_JOB_KIND};
use postline_db::{CredentialRepo, DraftRepo, PlatformCredential};
use postline_scheduler::runner::{HandlerError, JobHandler};
use postline_scheduler::queue::QueuedJob;
use postline_scheduler::store::JobStore;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::linkedin::{DocumentPlatform, DocumentState, DocumentStatus};
use crate::media::MediaSource;

/// Phases of one publish execution. A failure at any phase surfaces to
/// the queue's retry machinery, and the next attempt restarts the whole
/// sequence from `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PublishPhase {
    Pending,
    Uploading,
    Finalizing,
    Polling,
    Available,
    Posted,
}

impl PublishPhase {
    fn as_str(&self) -> &'static str {
        match self {
            PublishPhase::Pending => "pending",
            PublishPhase::Uploading => "uploading",
            PublishPhase::Finalizing => "finalizing",
            PublishPhase::Polling => "polling",
            PublishPhase::Available => "available",
            PublishPhase::Posted => "posted",
        }
    }
}

/// Polling cadence against the platform's asynchronous document
/// processing.
#[derive(Debug, Clone)]
pub struct PublishWorkerConfig {
    pub poll_interval: Duration,
    pub poll_jitter: Duration,
    pub poll_max_attempts: u32,
}

impl Default for PublishWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            poll_jitter: Duration::from_millis(500),
            poll_max_attempts: 30,
        }
    }
}

enum Outcome {
    Published,
    /// The schedule was cancelled after the job was claimed; nothing to do.
    Skipped,
}

/// Handles `publish_draft` jobs.
pub struct PublishWorker {
    drafts: Arc<dyn DraftRepo>,
    credentials: Arc<dyn CredentialRepo>,
    platform: Arc<dyn DocumentPlatform>,
    media: Arc<dyn MediaSource>,
    store: Arc<dyn JobStore>,
    config: PublishWorkerConfig,
}

impl PublishWorker {
    pub fn new(
        drafts: Arc<dyn DraftRepo>,
        credentials: Arc<dyn CredentialRepo>,
        platform: Arc<dyn DocumentPlatform>,
        media: Arc<dyn MediaSource>,
        store: Arc<dyn JobStore>,
        config: PublishWorkerConfig,
    ) -> Self {
        Self {
            drafts,
            credentials,
            platform,
            media,
            store,
            config,
        }
    }

    async fn publish(&self, job: &PublishJob) -> Result<Outcome, HandlerError> {
        let owner = &job.owner_id;
        let draft_id = &job.draft_id;

        debug!(draft_id = %draft_id, phase = PublishPhase::Pending.as_str(), "Publish started");

        // Guarded transition: a draft cancelled after its job was claimed
        // is no longer `scheduled`, and must not be resurrected.
        let picked_up = self
            .drafts
            .mark_in_progress(owner, draft_id)
            .await
            .map_err(retryable)?;
        if !picked_up {
            info!(draft_id = %draft_id, "Draft no longer scheduled; skipping publish");
            return Ok(Outcome::Skipped);
        }

        let draft = self
            .drafts
            .get(owner, draft_id)
            .await
            .map_err(retryable)?
            .ok_or_else(|| HandlerError::Permanent(format!("draft {draft_id} vanished")))?;

        let credential = self.resolve_credential(&draft.workspace_id, job).await?;

        let media_url = draft.media_url.as_deref().ok_or_else(|| {
            HandlerError::Permanent(format!("draft {draft_id} has no media to upload"))
        })?;

        let size = self
            .media
            .content_length(media_url)
            .await
            .map_err(retryable)?;
        if size == 0 {
            return Err(HandlerError::Retryable("source media is empty".to_string()));
        }

        debug!(draft_id = %draft_id, phase = PublishPhase::Uploading.as_str(), size, "Initializing upload");
        let session = self
            .platform
            .initialize_upload(&credential.access_token, &credential.author_urn, size)
            .await
            .map_err(retryable)?;

        let bytes = self.media.fetch(media_url).await.map_err(retryable)?;

        // Strictly sequential: finalize expects part IDs in byte-range
        // order, so chunks are never uploaded in parallel.
        let mut part_ids = Vec::with_capacity(session.instructions.len());
        for instruction in &session.instructions {
            let start = instruction.first_byte as usize;
            let end = instruction.last_byte as usize + 1;
            if start >= end || end > bytes.len() {
                return Err(HandlerError::Retryable(format!(
                    "upload instruction range {}..={} outside media of {} bytes",
                    instruction.first_byte,
                    instruction.last_byte,
                    bytes.len()
                )));
            }

            let part_id = self
                .platform
                .upload_chunk(
                    &credential.access_token,
                    &instruction.upload_url,
                    bytes.slice(start..end),
                )
                .await
                .map_err(retryable)?;
            part_ids.push(part_id);
        }

        debug!(
            draft_id = %draft_id,
            phase = PublishPhase::Finalizing.as_str(),
            parts = part_ids.len(),
            "Finalizing upload"
        );
        self.platform
            .finalize_upload(&credential.access_token, &session.document_urn, &part_ids)
            .await
            .map_err(retryable)?;

        let state = self
            .poll_until_available(&credential.access_token, &session.document_urn, draft_id)
            .await?;

        debug!(draft_id = %draft_id, phase = PublishPhase::Available.as_str(), "Document available");
        self.drafts
            .mark_published(
                owner,
                draft_id,
                &session.document_urn,
                state.download_url.as_deref(),
            )
            .await
            .map_err(retryable)?;

        let post_urn = self
            .platform
            .create_post(
                &credential.access_token,
                &credential.author_urn,
                &draft.content,
                &draft.name,
                &session.document_urn,
            )
            .await
            .map_err(retryable)?;

        info!(
            draft_id = %draft_id,
            owner_id = %owner,
            phase = PublishPhase::Posted.as_str(),
            document_urn = %session.document_urn,
            post_urn = %post_urn,
            "Draft published"
        );
        Ok(Outcome::Published)
    }

    async fn resolve_credential(
        &self,
        workspace_id: &Option<String>,
        job: &PublishJob,
    ) -> Result<PlatformCredential, HandlerError> {
        let workspace = workspace_id.clone().map(WorkspaceId::from);
        self.credentials
            .resolve(&job.owner_id, workspace.as_ref())
            .await
            .map_err(retryable)?
            .ok_or_else(|| {
                // Retrying cannot conjure an OAuth connection.
                HandlerError::Permanent(format!(
                    "no platform credentials for owner {}",
                    job.owner_id
                ))
            })
    }

    async fn poll_until_available(
        &self,
        access_token: &str,
        document_urn: &str,
        draft_id: &postline_core::DraftId,
    ) -> Result<DocumentState, HandlerError> {
        for attempt in 1..=self.config.poll_max_attempts {
            let state = self
                .platform
                .get_document(access_token, document_urn)
                .await
                .map_err(retryable)?;

            match state.status {
                DocumentStatus::Available => return Ok(state),
                DocumentStatus::ProcessingFailed => {
                    return Err(HandlerError::Retryable(
                        "platform failed to process the document".to_string(),
                    ));
                }
                DocumentStatus::Processing => {
                    debug!(
                        draft_id = %draft_id,
                        phase = PublishPhase::Polling.as_str(),
                        attempt,
                        "Document still processing"
                    );
                    if attempt < self.config.poll_max_attempts {
                        sleep(self.poll_sleep()).await;
                    }
                }
            }
        }

        Err(HandlerError::Retryable(format!(
            "document not available after {} polls",
            self.config.poll_max_attempts
        )))
    }

    fn poll_sleep(&self) -> Duration {
        let jitter_ms = self.config.poll_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.config.poll_interval;
        }
        self.config.poll_interval + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

#[async_trait]
impl JobHandler for PublishWorker {
    fn kind(&self) -> &'static str {
        PUBLISH_JOB_KIND
    }

    async fn handle(&self, job: &QueuedJob) -> Result<(), HandlerError> {
        let payload: PublishJob = serde_json::from_value(job.payload.clone())
            .map_err(|e| HandlerError::Permanent(format!("malformed payload: {e}")))?;

        match self.publish(&payload).await {
            Ok(_) => {
                self.release_handle(&payload, job).await;
                Ok(())
            }
            Err(err) => {
                let terminal =
                    matches!(err, HandlerError::Permanent(_)) || job.is_final_attempt();
                if terminal {
                    // Last attempt: the draft must not linger in
                    // `progress` with nothing left to finish it.
                    if let Err(e) = self
                        .drafts
                        .mark_failed(&payload.owner_id, &payload.draft_id)
                        .await
                    {
                        warn!(draft_id = %payload.draft_id, error = %e, "Failed to mark draft failed");
                    }
                    self.release_handle(&payload, job).await;
                }
                Err(err)
            }
        }
    }
}

impl PublishWorker {
    /// Drop the job-handle index entry, unless a reschedule already
    /// replaced it with a newer job.
    async fn release_handle(&self, payload: &PublishJob, job: &QueuedJob) {
        match self
            .store
            .remove_if(&payload.owner_id, &payload.draft_id, job.job_id())
            .await
        {
            Ok(_) => {}
            Err(e) => {
                warn!(draft_id = %payload.draft_id, error = %e, "Failed to release job handle");
            }
        }
    }
}

fn retryable(err: impl std::fmt::Display) -> HandlerError {
    HandlerError::Retryable(err.to_string())
}
