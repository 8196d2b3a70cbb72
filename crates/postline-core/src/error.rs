//! Error types for Postline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown time zone: {0}")]
    InvalidTimezone(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("scheduled time is not in the future: {0}")]
    PastSchedule(String),

    #[error("draft has no content to publish")]
    EmptyContent,

    #[error("job queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("job store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
