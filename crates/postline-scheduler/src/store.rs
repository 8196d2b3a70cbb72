//! Job-handle store backed by Redis.
//!
//! Maps `(owner, draft)` to the draft's currently pending queue job. The
//! queue stays authoritative over job existence; this index only supports
//! idempotent replacement and cancellation. Handles are swapped and taken
//! with single Redis commands, so concurrent reschedules for one draft
//! serialize on the store instead of racing an evict-then-write sequence.

use async_trait::async_trait;
use postline_core::{DraftId, JobId, UserId};
use redis::aio::ConnectionManager;

use crate::StoreError;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, owner: &UserId, draft: &DraftId) -> Result<Option<JobId>, StoreError>;

    /// Record `job` as the live handle and return whatever it replaced.
    async fn swap(
        &self,
        owner: &UserId,
        draft: &DraftId,
        job: JobId,
    ) -> Result<Option<JobId>, StoreError>;

    /// Remove the handle, returning the job it pointed at.
    async fn take(&self, owner: &UserId, draft: &DraftId) -> Result<Option<JobId>, StoreError>;

    /// Remove the handle only if it still points at `job`, so a finished
    /// execution never deletes the handle of a newer schedule.
    async fn remove_if(
        &self,
        owner: &UserId,
        draft: &DraftId,
        job: JobId,
    ) -> Result<bool, StoreError>;
}

/// Redis implementation of the job-handle store.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
}

const REMOVE_IF_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

impl RedisJobStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Open a connection-managed client against `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    fn key(owner: &UserId, draft: &DraftId) -> String {
        format!("postline:schedule:{owner}:{draft}")
    }

    fn parse(raw: Option<String>) -> Result<Option<JobId>, StoreError> {
        raw.map(|value| {
            value
                .parse()
                .map_err(|_| StoreError::MalformedHandle(value))
        })
        .transpose()
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get(&self, owner: &UserId, draft: &DraftId) -> Result<Option<JobId>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(owner, draft))
            .query_async(&mut conn)
            .await?;
        Self::parse(raw)
    }

    async fn swap(
        &self,
        owner: &UserId,
        draft: &DraftId,
        job: JobId,
    ) -> Result<Option<JobId>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("SET")
            .arg(Self::key(owner, draft))
            .arg(job.to_string())
            .arg("GET")
            .query_async(&mut conn)
            .await?;
        Self::parse(raw)
    }

    async fn take(&self, owner: &UserId, draft: &DraftId) -> Result<Option<JobId>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(Self::key(owner, draft))
            .query_async(&mut conn)
            .await?;
        Self::parse(raw)
    }

    async fn remove_if(
        &self,
        owner: &UserId,
        draft: &DraftId,
        job: JobId,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::Script::new(REMOVE_IF_SCRIPT)
            .key(Self::key(owner, draft))
            .arg(job.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}
