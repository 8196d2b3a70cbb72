//! Schedule management endpoints.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;
use postline_core::DraftId;
use postline_scheduler::ScheduleRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(schedule_draft).delete(cancel_schedule))
}

#[derive(Debug, Deserialize)]
struct ScheduleBody {
    draft_id: String,
    scheduled_at: String,
    time_zone: String,
    name: String,
    content: Option<String>,
    media_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScheduleResponse {
    job_id: String,
    scheduled_for: String,
    time_zone: String,
}

async fn schedule_draft(
    State(state): State<AppState>,
    Caller(identity): Caller,
    body: Result<Json<ScheduleBody>, JsonRejection>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if body.draft_id.is_empty() {
        return Err(ApiError::BadRequest("draft_id must not be empty".to_string()));
    }

    let receipt = state
        .scheduler
        .schedule(
            &identity,
            ScheduleRequest {
                draft_id: DraftId::from(body.draft_id),
                scheduled_at: body.scheduled_at,
                time_zone: body.time_zone,
                name: body.name,
                content: body.content,
                media_url: body.media_url,
            },
        )
        .await?;

    Ok(Json(ScheduleResponse {
        job_id: receipt.job_id.to_string(),
        scheduled_for: receipt.scheduled_for.to_rfc3339(),
        time_zone: receipt.time_zone,
    }))
}

#[derive(Debug, Deserialize)]
struct CancelBody {
    draft_id: String,
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    draft_id: String,
    status: String,
}

async fn cancel_schedule(
    State(state): State<AppState>,
    Caller(identity): Caller,
    body: Result<Json<CancelBody>, JsonRejection>,
) -> Result<Json<CancelResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if body.draft_id.is_empty() {
        return Err(ApiError::BadRequest("draft_id must not be empty".to_string()));
    }

    let draft_id = DraftId::from(body.draft_id);
    state.scheduler.cancel(&identity, &draft_id).await?;

    Ok(Json(CancelResponse {
        draft_id: draft_id.to_string(),
        status: "saved".to_string(),
    }))
}
