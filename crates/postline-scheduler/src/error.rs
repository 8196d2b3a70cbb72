//! Queue and store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("scheduled delay is negative")]
    InvalidSchedule,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("malformed handle: {0}")]
    MalformedHandle(String),
}
