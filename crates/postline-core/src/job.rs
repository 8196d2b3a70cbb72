//! Publish job payload.

use crate::id::{DraftId, UserId};
use serde::{Deserialize, Serialize};

/// Job kind for scheduled publishes. Unique across the application.
pub const PUBLISH_JOB_KIND: &str = "publish_draft";

/// Payload carried by a queued publish job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishJob {
    pub owner_id: UserId,
    pub draft_id: DraftId,
}

impl PublishJob {
    pub fn new(owner_id: UserId, draft_id: DraftId) -> Self {
        Self { owner_id, draft_id }
    }
}
