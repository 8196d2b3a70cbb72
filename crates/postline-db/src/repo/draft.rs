//! Draft repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postline_core::{DraftId, DraftStatus, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// A draft record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DraftRecord {
    pub id: String,
    pub owner_id: String,
    pub workspace_id: Option<String>,
    pub name: String,
    pub content: String,
    pub media_url: Option<String>,
    pub status: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub time_zone: Option<String>,
    pub document_urn: Option<String>,
    pub download_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DraftRecord {
    pub fn status(&self) -> DraftStatus {
        self.status.parse().unwrap_or(DraftStatus::Saved)
    }
}

/// Typed access to draft rows.
///
/// Status transitions are guarded inside the UPDATE statements themselves,
/// so the scheduler, the cancel path and the publish worker cannot race a
/// row into an illegal state.
#[async_trait]
pub trait DraftRepo: Send + Sync {
    async fn get(&self, owner: &UserId, id: &DraftId) -> DbResult<Option<DraftRecord>>;

    /// Create the draft if it does not exist yet (status `saved`), then
    /// apply the caller's name/content/media updates. First-time schedules
    /// of never-persisted drafts land here.
    async fn upsert(
        &self,
        owner: &UserId,
        workspace: Option<&WorkspaceId>,
        id: &DraftId,
        name: &str,
        content: Option<&str>,
        media_url: Option<&str>,
    ) -> DbResult<DraftRecord>;

    async fn mark_scheduled(
        &self,
        owner: &UserId,
        id: &DraftId,
        scheduled_for: DateTime<Utc>,
        time_zone: &str,
        name: &str,
    ) -> DbResult<()>;

    /// `scheduled -> progress`. Re-entrant for queue retries, which find
    /// the draft already in `progress`. Returns false when the draft is in
    /// neither state, i.e. the schedule was cancelled after the job was
    /// claimed.
    async fn mark_in_progress(&self, owner: &UserId, id: &DraftId) -> DbResult<bool>;

    /// `progress -> published`, recording the platform references.
    async fn mark_published(
        &self,
        owner: &UserId,
        id: &DraftId,
        document_urn: &str,
        download_url: Option<&str>,
    ) -> DbResult<()>;

    /// `progress -> failed`.
    async fn mark_failed(&self, owner: &UserId, id: &DraftId) -> DbResult<()>;

    /// `scheduled -> saved`, clearing the schedule fields. Also clears
    /// stale fields on drafts whose job already fired.
    async fn clear_schedule(&self, owner: &UserId, id: &DraftId) -> DbResult<()>;

    /// Drafts sitting in `progress` since before `cutoff`, for the
    /// reconciliation sweep.
    async fn find_stuck_in_progress(&self, cutoff: DateTime<Utc>)
    -> DbResult<Vec<DraftRecord>>;
}

/// PostgreSQL implementation of DraftRepo.
pub struct PgDraftRepo {
    pool: PgPool,
}

impl PgDraftRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DraftRepo for PgDraftRepo {
    async fn get(&self, owner: &UserId, id: &DraftId) -> DbResult<Option<DraftRecord>> {
        let record = sqlx::query_as::<_, DraftRecord>(
            "SELECT * FROM drafts WHERE owner_id = $1 AND id = $2",
        )
        .bind(owner.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert(
        &self,
        owner: &UserId,
        workspace: Option<&WorkspaceId>,
        id: &DraftId,
        name: &str,
        content: Option<&str>,
        media_url: Option<&str>,
    ) -> DbResult<DraftRecord> {
        let record = sqlx::query_as::<_, DraftRecord>(
            r#"
            INSERT INTO drafts (id, owner_id, workspace_id, name, content, media_url, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, ''), $6, 'saved', NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                content = COALESCE($5, drafts.content),
                media_url = COALESCE($6, drafts.media_url),
                updated_at = NOW()
            WHERE drafts.owner_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_str())
        .bind(owner.as_str())
        .bind(workspace.map(|w| w.as_str()))
        .bind(name)
        .bind(content)
        .bind(media_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("draft {id} belongs to another owner")))?;
        Ok(record)
    }

    async fn mark_scheduled(
        &self,
        owner: &UserId,
        id: &DraftId,
        scheduled_for: DateTime<Utc>,
        time_zone: &str,
        name: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE drafts
            SET status = 'scheduled', scheduled_for = $3, time_zone = $4, name = $5, updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner.as_str())
        .bind(id.as_str())
        .bind(scheduled_for)
        .bind(time_zone)
        .bind(name)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("draft {id}")));
        }
        Ok(())
    }

    async fn mark_in_progress(&self, owner: &UserId, id: &DraftId) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE drafts
            SET status = 'progress', updated_at = NOW()
            WHERE owner_id = $1 AND id = $2 AND status IN ('scheduled', 'progress')
            "#,
        )
        .bind(owner.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_published(
        &self,
        owner: &UserId,
        id: &DraftId,
        document_urn: &str,
        download_url: Option<&str>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE drafts
            SET status = 'published', document_urn = $3, download_url = $4, updated_at = NOW()
            WHERE owner_id = $1 AND id = $2 AND status = 'progress'
            "#,
        )
        .bind(owner.as_str())
        .bind(id.as_str())
        .bind(document_urn)
        .bind(download_url)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("draft {id} not in progress")));
        }
        Ok(())
    }

    async fn mark_failed(&self, owner: &UserId, id: &DraftId) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE drafts
            SET status = 'failed', updated_at = NOW()
            WHERE owner_id = $1 AND id = $2 AND status = 'progress'
            "#,
        )
        .bind(owner.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_schedule(&self, owner: &UserId, id: &DraftId) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE drafts
            SET status = CASE WHEN status = 'scheduled' THEN 'saved' ELSE status END,
                scheduled_for = NULL, time_zone = NULL, updated_at = NOW()
            WHERE owner_id = $1 AND id = $2
            "#,
        )
        .bind(owner.as_str())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("draft {id}")));
        }
        Ok(())
    }

    async fn find_stuck_in_progress(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DbResult<Vec<DraftRecord>> {
        let records = sqlx::query_as::<_, DraftRecord>(
            "SELECT * FROM drafts WHERE status = 'progress' AND updated_at < $1 ORDER BY updated_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
