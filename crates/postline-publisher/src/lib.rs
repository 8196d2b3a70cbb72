//! Publish worker for Postline.
//!
//! Executes the platform's chunked document upload protocol for each
//! dispatched job: initialize an upload session, PUT every byte-range
//! chunk in order, finalize with the accumulated part IDs, poll until the
//! document is available, then publish the post referencing it.

pub mod linkedin;
pub mod media;
pub mod worker;

pub use linkedin::{
    DocumentPlatform, DocumentState, DocumentStatus, LinkedInClient, PlatformError,
    UploadInstruction, UploadSession,
};
pub use media::{HttpMediaSource, MediaError, MediaSource};
pub use worker::{PublishWorker, PublishWorkerConfig};
