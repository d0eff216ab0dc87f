//! View and like counters on a finished highlight.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use hoop_models::job::JobId;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ViewRequest {
    #[serde(rename = "highlightId")]
    pub highlight_id: String,
}

#[derive(Serialize)]
pub struct ViewResponse {
    pub ok: bool,
    #[serde(rename = "viewsCount")]
    pub views_count: u64,
}

/// `POST /video/engagement/view` — record a view, atomically incrementing
/// the counter rather than reading, adding one, and writing back.
pub async fn record_view(
    State(state): State<AppState>,
    Json(req): Json<ViewRequest>,
) -> ApiResult<Json<ViewResponse>> {
    if req.highlight_id.trim().is_empty() {
        return Err(ApiError::bad_request("highlightId is required"));
    }

    let job_id = JobId::from_string(req.highlight_id.clone());
    let mut job = state
        .jobs
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("highlight {} not found", req.highlight_id)))?;

    state.jobs.increment_counter(&job_id, "views_count", 1).await?;
    job.views_count += 1;
    job.last_viewed_at = Some(Utc::now());
    job.updated_at = Utc::now();
    let _ = state.jobs.update(&job).await;

    Ok(Json(ViewResponse { ok: true, views_count: job.views_count }))
}

#[derive(Deserialize)]
pub struct LikeRequest {
    #[serde(rename = "highlightId")]
    pub highlight_id: String,
    pub delta: i64,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub ok: bool,
    #[serde(rename = "likesCount")]
    pub likes_count: u64,
    #[serde(rename = "likedByCurrentUser")]
    pub liked_by_current_user: bool,
}

/// `POST /video/engagement/like` — `delta` of `+1` likes, `-1` unlikes; any
/// other value is rejected. Tracks `x-user-email` in `liked_by_emails` so a
/// repeat like from the same caller is idempotent rather than double-counted.
pub async fn record_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LikeRequest>,
) -> ApiResult<Json<LikeResponse>> {
    if req.highlight_id.trim().is_empty() {
        return Err(ApiError::bad_request("highlightId is required"));
    }
    if req.delta != 1 && req.delta != -1 && req.delta != 0 {
        return Err(ApiError::bad_request("delta must be -1, 0, or 1"));
    }

    let user_email = headers
        .get("x-user-email")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let job_id = JobId::from_string(req.highlight_id.clone());
    let mut job = state
        .jobs
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("highlight {} not found", req.highlight_id)))?;

    let already_liked = user_email
        .as_deref()
        .map(|e| job.liked_by_emails.contains(e))
        .unwrap_or(false);

    let liked_by_current_user = match req.delta {
        1 if !already_liked => {
            state.jobs.increment_counter(&job_id, "likes_count", 1).await?;
            job.likes_count += 1;
            if let Some(email) = &user_email {
                state.jobs.add_liked_by(&job_id, email).await?;
                job.liked_by_emails.insert(email.clone());
            }
            job.last_liked_at = Some(Utc::now());
            true
        }
        -1 if already_liked => {
            state.jobs.increment_counter(&job_id, "likes_count", -1).await?;
            job.likes_count = job.likes_count.saturating_sub(1);
            if let Some(email) = &user_email {
                state.jobs.remove_liked_by(&job_id, email).await?;
                job.liked_by_emails.remove(email);
            }
            false
        }
        _ => already_liked,
    };

    job.updated_at = Utc::now();
    let _ = state.jobs.update(&job).await;

    Ok(Json(LikeResponse {
        ok: true,
        likes_count: job.likes_count,
        liked_by_current_user,
    }))
}
