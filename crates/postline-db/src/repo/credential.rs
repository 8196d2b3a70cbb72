//! Platform credential repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postline_core::{UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::DbResult;

/// An owner's (or workspace's) OAuth connection to the publishing platform.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlatformCredential {
    pub id: uuid::Uuid,
    pub owner_id: String,
    pub workspace_id: Option<String>,
    pub access_token: String,
    /// URN the platform expects as the author of uploads and posts,
    /// e.g. `urn:li:person:..` or `urn:li:organization:..`.
    pub author_urn: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Resolve the credential to publish with. A workspace-scoped
    /// credential wins over the owner's personal one.
    async fn resolve(
        &self,
        owner: &UserId,
        workspace: Option<&WorkspaceId>,
    ) -> DbResult<Option<PlatformCredential>>;
}

/// PostgreSQL implementation of CredentialRepo.
pub struct PgCredentialRepo {
    pool: PgPool,
}

impl PgCredentialRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepo for PgCredentialRepo {
    async fn resolve(
        &self,
        owner: &UserId,
        workspace: Option<&WorkspaceId>,
    ) -> DbResult<Option<PlatformCredential>> {
        let credential = sqlx::query_as::<_, PlatformCredential>(
            r#"
            SELECT * FROM platform_credentials
            WHERE owner_id = $1 AND (workspace_id = $2 OR workspace_id IS NULL)
            ORDER BY workspace_id NULLS LAST, updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(owner.as_str())
        .bind(workspace.map(|w| w.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }
}
