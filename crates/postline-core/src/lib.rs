//! Core domain types for the Postline publishing scheduler.
//!
//! This crate contains:
//! - Identifiers for owners, workspaces, drafts and queue jobs
//! - The draft status state machine
//! - The publish job payload
//! - Schedule-time parsing and validation
//! - The shared error taxonomy

pub mod draft;
pub mod error;
pub mod id;
pub mod job;
pub mod schedule;

pub use draft::DraftStatus;
pub use error::{Error, Result};
pub use id::{DraftId, Identity, JobId, UserId, WorkspaceId};
pub use job::PublishJob;
