//! Job document retrieval and shot-event editing.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use hoop_models::job::{Job, JobId, ShotEvent, ShotOutcome};
use hoop_storage::{parse_uri, sign_read_url, DOWNLOAD_TTL};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

async fn get_job_or_404(state: &AppState, job_id: &str) -> ApiResult<Job> {
    state
        .jobs
        .get(&JobId::from_string(job_id.to_string()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))
}

/// `GET /jobs/{id}` — the raw job document, as stored.
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<Job>> {
    Ok(Json(get_job_or_404(&state, &job_id).await?))
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub ok: bool,
    pub url: String,
    #[serde(rename = "expiresInMinutes")]
    pub expires_in_minutes: u32,
    #[serde(rename = "sourceVideoUrl", skip_serializing_if = "Option::is_none")]
    pub source_video_url: Option<String>,
    #[serde(rename = "shotEvents", skip_serializing_if = "Option::is_none")]
    pub shot_events: Option<Vec<ShotEvent>>,
}

/// `GET /jobs/{id}/download` — signed URL for the finished highlight. 409 if
/// the job hasn't reached a status with output to download yet.
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<DownloadResponse>> {
    let job = get_job_or_404(&state, &job_id).await?;

    let output_uri = job
        .output_gcs_uri
        .clone()
        .ok_or_else(|| ApiError::conflict("job has no output ready for download"))?;
    let (bucket, key) = parse_uri(&output_uri)?;
    let (url, expires_in_minutes) = sign_read_url(&state.gcs, &bucket, &key, DOWNLOAD_TTL).await?;

    let source_video_url = match &job.video_gcs_uri {
        Some(uri) => {
            let (src_bucket, src_key) = parse_uri(uri)?;
            Some(sign_read_url(&state.gcs, &src_bucket, &src_key, DOWNLOAD_TTL).await?.0)
        }
        None => None,
    };

    let shot_events = if job.analysis_gcs_uri.is_some() {
        Some(job.shot_events.clone())
    } else {
        None
    };

    Ok(Json(DownloadResponse {
        ok: true,
        url,
        expires_in_minutes,
        source_video_url,
        shot_events,
    }))
}

#[derive(Serialize)]
pub struct HighlightDataResponse {
    #[serde(rename = "sourceVideoUrl")]
    pub source_video_url: String,
    #[serde(rename = "rawEvents")]
    pub raw_events: Vec<ShotEvent>,
    pub ranges: Vec<ShotRange>,
}

#[derive(Serialize)]
pub struct ShotRange {
    pub start: u32,
    pub end: u32,
}

/// `GET /jobs/{id}/highlight-data` — the editor view: source video plus raw
/// detected events and the derived clip ranges, before any render happens.
pub async fn highlight_data(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<HighlightDataResponse>> {
    let job = get_job_or_404(&state, &job_id).await?;

    let video_gcs_uri = job
        .video_gcs_uri
        .clone()
        .ok_or_else(|| ApiError::conflict("job has no source video yet"))?;
    let (bucket, key) = parse_uri(&video_gcs_uri)?;
    let (source_video_url, _) = sign_read_url(&state.gcs, &bucket, &key, DOWNLOAD_TTL).await?;

    if job.shot_events.is_empty() && !job.status.is_terminal() {
        return Err(ApiError::conflict("analysis not finished yet"));
    }

    let ranges = job
        .shot_events
        .iter()
        .filter(|e| !e.deleted && e.show)
        .map(|e| ShotRange { start: e.timestamp_start, end: e.timestamp_end })
        .collect();

    Ok(Json(HighlightDataResponse {
        source_video_url,
        raw_events: job.shot_events.clone(),
        ranges,
    }))
}

#[derive(Deserialize)]
pub struct CreateShotEventRequest {
    pub timestamp_start: u32,
    pub timestamp_end: u32,
    #[serde(default)]
    pub outcome: Option<String>,
}

#[derive(Serialize)]
pub struct ShotEventResponse {
    pub ok: bool,
    pub event: ShotEvent,
}

/// `POST /jobs/{id}/shot-events` — append a user-added shot event.
pub async fn create_shot_event(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(req): Json<CreateShotEventRequest>,
) -> ApiResult<Json<ShotEventResponse>> {
    if req.timestamp_end < req.timestamp_start {
        return Err(ApiError::bad_request("timestamp_end must be >= timestamp_start"));
    }

    let mut job = get_job_or_404(&state, &job_id).await?;
    let next_id = job.shot_events.iter().map(|e| e.id).max().map(|n| n + 1).unwrap_or(0);

    let event = ShotEvent {
        id: next_id,
        timestamp_start: req.timestamp_start,
        timestamp_end: req.timestamp_end,
        outcome: req.outcome.as_deref().map(ShotOutcome::from_raw).unwrap_or_default(),
        subject: None,
        shot_type: None,
        shot_location: None,
        show: true,
        deleted: false,
    };

    job.shot_events.push(event.clone());
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    Ok(Json(ShotEventResponse { ok: true, event }))
}

#[derive(Deserialize)]
pub struct UpdateShotEventRequest {
    pub show: Option<bool>,
    pub outcome: Option<String>,
    pub timestamp_start: Option<u32>,
    pub timestamp_end: Option<u32>,
}

/// `PATCH /jobs/{id}/shot-events/{eventId}` — edit an existing event in place.
pub async fn update_shot_event(
    State(state): State<AppState>,
    Path((job_id, event_id)): Path<(String, u32)>,
    Json(req): Json<UpdateShotEventRequest>,
) -> ApiResult<Json<ShotEventResponse>> {
    let mut job = get_job_or_404(&state, &job_id).await?;

    let event = job
        .shot_events
        .iter_mut()
        .find(|e| e.id == event_id)
        .ok_or_else(|| ApiError::not_found(format!("shot event {event_id} not found")))?;

    if let Some(show) = req.show {
        event.show = show;
    }
    if let Some(outcome) = &req.outcome {
        event.outcome = ShotOutcome::from_raw(outcome);
    }
    if let Some(start) = req.timestamp_start {
        event.timestamp_start = start;
    }
    if let Some(end) = req.timestamp_end {
        event.timestamp_end = end;
    }
    if event.timestamp_end < event.timestamp_start {
        return Err(ApiError::bad_request("timestamp_end must be >= timestamp_start"));
    }

    let updated = event.clone();
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    Ok(Json(ShotEventResponse { ok: true, event: updated }))
}

#[derive(Serialize)]
pub struct DeleteShotEventResponse {
    pub ok: bool,
    pub deleted: bool,
}

/// `DELETE /jobs/{id}/shot-events/{eventId}` — soft-delete: the event stays
/// in the document so an undo can flip `deleted` back off, but is excluded
/// from any derived ranges.
pub async fn delete_shot_event(
    State(state): State<AppState>,
    Path((job_id, event_id)): Path<(String, u32)>,
) -> ApiResult<Json<DeleteShotEventResponse>> {
    let mut job = get_job_or_404(&state, &job_id).await?;

    let event = job
        .shot_events
        .iter_mut()
        .find(|e| e.id == event_id)
        .ok_or_else(|| ApiError::not_found(format!("shot event {event_id} not found")))?;

    event.deleted = true;
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    Ok(Json(DeleteShotEventResponse { ok: true, deleted: true }))
}
