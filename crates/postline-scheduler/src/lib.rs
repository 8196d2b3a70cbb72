//! Scheduling subsystem for Postline.
//!
//! Holds publish jobs until their scheduled instant and dispatches each one
//! to exactly one runner. Uses PostgreSQL with SKIP LOCKED for distributed
//! claiming and Redis for the per-draft job-handle index.

pub mod error;
pub mod memory;
pub mod queue;
pub mod reconciler;
pub mod runner;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{QueueError, StoreError};
pub use memory::{InMemoryDelayQueue, InMemoryJobStore};
pub use queue::{DelayQueue, JobFate, JobOptions, PgDelayQueue, QueuedJob};
pub use reconciler::{Reconciler, SweepReport};
pub use runner::{HandlerError, JobHandler, JobRunner};
pub use service::{RetryPolicy, ScheduleReceipt, ScheduleRequest, Scheduler};
pub use store::{JobStore, RedisJobStore};
