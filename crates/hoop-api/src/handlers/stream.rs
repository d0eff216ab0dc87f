//! Direct-redirect streaming endpoint.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use hoop_models::job::JobId;
use hoop_storage::{parse_uri, sign_read_url, STREAM_TTL};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /stream/{id}` — 307 redirect to a signed URL for the best video this
/// job has: the finished highlight if rendered, otherwise the raw source.
pub async fn stream(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Response> {
    let job = state
        .jobs
        .get(&JobId::from_string(job_id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;

    let uri = job
        .output_gcs_uri
        .clone()
        .or_else(|| job.video_gcs_uri.clone())
        .ok_or_else(|| ApiError::not_found("job has no video to stream"))?;

    let (bucket, key) = parse_uri(&uri)?;
    let (url, _) = sign_read_url(&state.gcs, &bucket, &key, STREAM_TTL).await?;

    Ok((StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, url)]).into_response())
}
