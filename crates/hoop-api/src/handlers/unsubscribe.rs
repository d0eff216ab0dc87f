//! Notification-email unsubscribe link handler.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct UnsubscribeResponse {
    pub ok: bool,
}

/// `POST /unsubscribe` — the token is the job id; unsubscribing clears the
/// owner email so no further notification email goes out for this job.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> ApiResult<Json<UnsubscribeResponse>> {
    if req.token.trim().is_empty() {
        return Err(ApiError::bad_request("token is required"));
    }

    let job_id = hoop_models::job::JobId::from_string(req.token.clone());
    let mut job = state
        .jobs
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("unknown unsubscribe token"))?;

    job.owner_email = None;
    job.updated_at = chrono::Utc::now();
    state.jobs.update(&job).await?;

    Ok(Json(UnsubscribeResponse { ok: true }))
}
