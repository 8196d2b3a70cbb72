//! Caller identity extraction.
//!
//! Authentication itself happens upstream; the proxy in front of this
//! service resolves the session and forwards the caller as headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use postline_core::{Identity, UserId, WorkspaceId};

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";
pub const WORKSPACE_HEADER: &str = "x-workspace-id";

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_HEADER} header")))?;

        let workspace = parts
            .headers
            .get(WORKSPACE_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(WorkspaceId::from);

        Ok(Caller(Identity::new(UserId::from(owner), workspace)))
    }
}
