//! Repository traits and implementations.

pub mod credential;
pub mod draft;

pub use credential::{CredentialRepo, PgCredentialRepo, PlatformCredential};
pub use draft::{DraftRecord, DraftRepo, PgDraftRepo};
