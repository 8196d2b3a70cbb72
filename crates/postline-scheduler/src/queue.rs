//! Delay queue implementation using PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postline_core::JobId;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;

use crate::QueueError;

/// A queued job.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueuedJob {
    pub id: uuid::Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_ms: i64,
    pub status: String,
    pub last_error: Option<String>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn job_id(&self) -> JobId {
        JobId::from_uuid(self.id)
    }

    /// Whether the attempt currently executing is the job's last one.
    pub fn is_final_attempt(&self) -> bool {
        self.attempts + 1 >= self.max_attempts
    }
}

/// Per-job scheduling and retry options.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Time until the job becomes due. Negative delays are rejected;
    /// callers validate against the wall clock first.
    pub delay: chrono::Duration,
    pub max_attempts: u32,
    /// Base of the exponential retry backoff.
    pub backoff: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            delay: chrono::Duration::zero(),
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// What became of a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFate {
    /// Returned to the queue; `attempt` executions have now failed.
    Retrying { attempt: u32 },
    /// Out of attempts. Retained in the queue as `failed` for inspection.
    Exhausted,
}

/// A time-ordered work queue with delayed delivery.
///
/// Jobs are dispatched to exactly one claimant once due, removed on
/// success, and retained as `failed` once their attempts are exhausted.
#[async_trait]
pub trait DelayQueue: Send + Sync {
    async fn enqueue(
        &self,
        kind: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<QueuedJob, QueueError>;

    async fn get_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError>;

    /// Cancel a job still waiting in its delay window. Returns false when
    /// the job is already claimed or gone.
    async fn remove(&self, id: JobId) -> Result<bool, QueueError>;

    /// Claim the next due job.
    async fn claim_due(&self, worker_id: &str) -> Result<Option<QueuedJob>, QueueError>;

    /// Delete a successfully completed job, bounding queue growth.
    async fn complete(&self, id: JobId) -> Result<(), QueueError>;

    /// Record a failed attempt: back off and requeue, or retain as failed
    /// once attempts are exhausted.
    async fn fail(&self, id: JobId, error: &str) -> Result<JobFate, QueueError>;

    /// Retain a job as failed immediately, skipping remaining retries.
    async fn discard(&self, id: JobId, error: &str) -> Result<(), QueueError>;

    /// Return claims abandoned by dead workers to the pending state.
    async fn release_stale(&self, older_than: Duration) -> Result<u64, QueueError>;

    /// Pending jobs of one kind, oldest due first.
    async fn list_pending(&self, kind: &str) -> Result<Vec<QueuedJob>, QueueError>;
}

/// Delay queue backed by PostgreSQL.
///
/// Claiming uses SKIP LOCKED so concurrent runners never receive the same
/// job.
pub struct PgDelayQueue {
    pool: PgPool,
}

impl PgDelayQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DelayQueue for PgDelayQueue {
    async fn enqueue(
        &self,
        kind: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<QueuedJob, QueueError> {
        if options.delay < chrono::Duration::zero() {
            return Err(QueueError::InvalidSchedule);
        }

        let job = sqlx::query_as::<_, QueuedJob>(
            r#"
            INSERT INTO publish_jobs (id, kind, payload, run_at, max_attempts, backoff_ms, status, created_at)
            VALUES ($1, $2, $3, NOW() + $4 * INTERVAL '1 millisecond', $5, $6, 'pending', NOW())
            RETURNING *
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(kind)
        .bind(payload)
        .bind(options.delay.num_milliseconds())
        .bind(options.max_attempts as i32)
        .bind(options.backoff.as_millis() as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        let job = sqlx::query_as::<_, QueuedJob>("SELECT * FROM publish_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn remove(&self, id: JobId) -> Result<bool, QueueError> {
        let result = sqlx::query("DELETE FROM publish_jobs WHERE id = $1 AND status = 'pending'")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn claim_due(&self, worker_id: &str) -> Result<Option<QueuedJob>, QueueError> {
        let job = sqlx::query_as::<_, QueuedJob>(
            r#"
            UPDATE publish_jobs
            SET status = 'running', claimed_by = $1, claimed_at = NOW()
            WHERE id = (
                SELECT id FROM publish_jobs
                WHERE status = 'pending' AND run_at <= NOW()
                ORDER BY run_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn complete(&self, id: JobId) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM publish_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<JobFate, QueueError> {
        let row: Option<(String, i32)> = sqlx::query_as(
            r#"
            UPDATE publish_jobs
            SET attempts = attempts + 1,
                last_error = $2,
                claimed_by = NULL,
                claimed_at = NULL,
                status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'pending' END,
                run_at = CASE WHEN attempts + 1 >= max_attempts THEN run_at
                         ELSE NOW() + (backoff_ms * POWER(2, attempts)) * INTERVAL '1 millisecond' END
            WHERE id = $1
            RETURNING status, attempts
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((status, _)) if status == "failed" => Ok(JobFate::Exhausted),
            Some((_, attempts)) => Ok(JobFate::Retrying {
                attempt: attempts as u32,
            }),
            // Job vanished under us; nothing left to retry.
            None => Ok(JobFate::Exhausted),
        }
    }

    async fn discard(&self, id: JobId, error: &str) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            UPDATE publish_jobs
            SET status = 'failed', last_error = $2, attempts = attempts + 1,
                claimed_by = NULL, claimed_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE publish_jobs
            SET status = 'pending', claimed_by = NULL, claimed_at = NULL
            WHERE status = 'running' AND claimed_at < NOW() - $1 * INTERVAL '1 millisecond'
            "#,
        )
        .bind(older_than.as_millis() as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_pending(&self, kind: &str) -> Result<Vec<QueuedJob>, QueueError> {
        let jobs = sqlx::query_as::<_, QueuedJob>(
            "SELECT * FROM publish_jobs WHERE kind = $1 AND status = 'pending' ORDER BY run_at",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }
}
