//! Ingest handlers: direct multipart upload, the two-phase signed-URL
//! upload, and the publish endpoints that hand a job to the worker queue.

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use hoop_models::job::{Job, JobId, PipelineMode};
use hoop_queue::{FinalClipRange, JobEnvelope};
use hoop_storage::{format_uri, parse_uri, sign_write_url, UPLOAD_TTL};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn owner_email_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-owner-email")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub status: String,
    #[serde(rename = "videoGcsUri")]
    pub video_gcs_uri: String,
}

/// `POST /upload` — streams the uploaded file straight into the raw bucket;
/// the bytes never touch local disk. Rate-limited upstream to 1/minute per
/// caller identity by [`crate::middleware::upload_rate_limit_middleware`].
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let owner_email = owner_email_header(&headers);
    let mut user_id: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut body: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "userId" => {
                user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("invalid userId field: {e}")))?,
                );
            }
            "file" | "video" => {
                file_name = field.file_name().map(str::to_string);
                content_type = field.content_type().map(str::to_string);
                body = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("reading upload body: {e}")))?,
                );
            }
            _ => {}
        }
    }

    let file_name = file_name.ok_or_else(|| ApiError::bad_request("missing file"))?;
    let body = body.ok_or_else(|| ApiError::bad_request("missing file"))?;
    if file_name.trim().is_empty() {
        return Err(ApiError::bad_request("missing filename"));
    }

    let mut job = Job::new_upload(&file_name, user_id.clone(), owner_email.clone());
    let key = format!("uploads/{}/{}", job.job_id, file_name);
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    state
        .gcs
        .upload_bytes(&state.config.raw_bucket, &key, body.to_vec(), &content_type)
        .await?;

    let video_gcs_uri = format_uri(&state.config.raw_bucket, &key);
    job.video_gcs_uri = Some(video_gcs_uri.clone());
    job.status = hoop_models::job::JobStatus::Queued;
    job.queued_at = Some(Utc::now());
    job.updated_at = Utc::now();
    state.jobs.merge(&job).await?;

    publish_envelope(&state, &job, PipelineMode::Analysis, None).await?;

    Ok(Json(UploadResponse {
        ok: true,
        job_id: job.job_id.to_string(),
        status: job.status.as_str().to_string(),
        video_gcs_uri,
    }))
}

#[derive(Deserialize)]
pub struct UploadInitRequest {
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "videoDurationSec")]
    pub video_duration_sec: Option<u32>,
}

#[derive(Serialize)]
pub struct UploadInitResponse {
    pub ok: bool,
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
    #[serde(rename = "videoGcsUri")]
    pub video_gcs_uri: String,
}

/// `POST /upload/init` — the client PUTs directly to the object store with
/// the returned URL, bypassing this service's bandwidth entirely.
pub async fn upload_init(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadInitRequest>,
) -> ApiResult<Json<UploadInitResponse>> {
    if req.filename.trim().is_empty() {
        return Err(ApiError::bad_request("filename is required"));
    }
    if req.content_type.trim().is_empty() {
        return Err(ApiError::bad_request("contentType is required"));
    }

    let owner_email = owner_email_header(&headers);
    let mut job = Job::new_upload(&req.filename, req.user_id.clone(), owner_email);
    job.video_duration_sec = req.video_duration_sec;

    let key = format!("uploads/{}/{}", job.job_id, req.filename);
    let upload_url = sign_write_url(&state.gcs, &state.config.raw_bucket, &key, &req.content_type, UPLOAD_TTL)
        .await
        .map(|(url, _)| url)?;

    let video_gcs_uri = format_uri(&state.config.raw_bucket, &key);
    job.video_gcs_uri = Some(video_gcs_uri.clone());
    state.jobs.merge(&job).await?;

    Ok(Json(UploadInitResponse {
        ok: true,
        job_id: job.job_id.to_string(),
        upload_url,
        video_gcs_uri,
    }))
}

#[derive(Deserialize)]
pub struct UploadCompleteRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct UploadCompleteResponse {
    pub ok: bool,
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub status: String,
}

/// `POST /upload/complete` — verifies the object actually landed before
/// queuing the job; a client that never finishes the PUT must not enqueue
/// a job the worker will fail to download.
pub async fn upload_complete(
    State(state): State<AppState>,
    Json(req): Json<UploadCompleteRequest>,
) -> ApiResult<Json<UploadCompleteResponse>> {
    let job_id = JobId::from_string(req.job_id.clone());
    let mut job = state
        .jobs
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {} not found", req.job_id)))?;

    let video_gcs_uri = job
        .video_gcs_uri
        .clone()
        .ok_or_else(|| ApiError::bad_request("job has no pending upload"))?;
    let (bucket, key) = parse_uri(&video_gcs_uri)?;

    if !state.gcs.exists(&bucket, &key).await? {
        return Err(ApiError::upstream_failure("uploaded object not found in storage"));
    }

    job.status = hoop_models::job::JobStatus::Queued;
    job.queued_at = Some(Utc::now());
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    publish_envelope(&state, &job, PipelineMode::Analysis, None)
        .await
        .map_err(|_| {
            ApiError::upstream_failure("failed to publish job to the processing queue")
        })?;

    Ok(Json(UploadCompleteResponse {
        ok: true,
        job_id: job.job_id.to_string(),
        status: job.status.as_str().to_string(),
    }))
}

#[derive(Deserialize)]
pub struct PublishJobRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "videoGcsUri")]
    pub video_gcs_uri: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// `POST /publish_job` — re-publish (or first-publish) a job for the full
/// analyze pipeline. Used when ingestion and queueing happen as separate
/// calls rather than through `/upload`.
pub async fn publish_job(
    State(state): State<AppState>,
    Json(req): Json<PublishJobRequest>,
) -> ApiResult<Json<OkResponse>> {
    if req.job_id.trim().is_empty() || req.video_gcs_uri.trim().is_empty() {
        return Err(ApiError::bad_request("jobId and videoGcsUri are required"));
    }

    let job_id = JobId::from_string(req.job_id.clone());
    let mut job = state
        .jobs
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {} not found", req.job_id)))?;

    job.video_gcs_uri = Some(req.video_gcs_uri.clone());
    if req.user_id.is_some() {
        job.user_id = req.user_id.clone();
    }
    job.status = hoop_models::job::JobStatus::Queued;
    job.queued_at = Some(Utc::now());
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    match publish_envelope(&state, &job, PipelineMode::Analysis, None).await {
        Ok(()) => Ok(Json(OkResponse { ok: true })),
        Err(e) => {
            mark_publish_error(&state, &mut job, hoop_models::job::JobStatus::PublishError).await;
            Err(ApiError::upstream_failure(format!("publish failed: {e}")))
        }
    }
}

#[derive(Deserialize)]
pub struct PublishRenderJobRequest {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "videoGcsUri")]
    pub video_gcs_uri: String,
    #[serde(rename = "finalClips")]
    pub final_clips: Vec<FinalClipRangeInput>,
}

#[derive(Deserialize)]
pub struct FinalClipRangeInput {
    pub start: f64,
    pub end: f64,
}

/// `POST /publish_render_job` — publish a `mode=render` envelope from
/// user-edited clip ranges, skipping analysis entirely (§4.9).
pub async fn publish_render_job(
    State(state): State<AppState>,
    Json(req): Json<PublishRenderJobRequest>,
) -> ApiResult<Json<OkResponse>> {
    if req.job_id.trim().is_empty() || req.video_gcs_uri.trim().is_empty() || req.final_clips.is_empty() {
        return Err(ApiError::bad_request(
            "jobId, videoGcsUri, and a non-empty finalClips are required",
        ));
    }

    let job_id = JobId::from_string(req.job_id.clone());
    let mut job = state
        .jobs
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {} not found", req.job_id)))?;

    job.video_gcs_uri = Some(req.video_gcs_uri.clone());
    job.mode = PipelineMode::Render;
    job.status = hoop_models::job::JobStatus::Queued;
    job.queued_at = Some(Utc::now());
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    let final_clips: Vec<FinalClipRange> = req
        .final_clips
        .iter()
        .map(|c| FinalClipRange { start: c.start, end: c.end })
        .collect();

    match publish_envelope(&state, &job, PipelineMode::Render, Some(final_clips)).await {
        Ok(()) => Ok(Json(OkResponse { ok: true })),
        Err(e) => {
            mark_publish_error(&state, &mut job, hoop_models::job::JobStatus::RenderPublishError).await;
            Err(ApiError::upstream_failure(format!("render publish failed: {e}")))
        }
    }
}

async fn publish_envelope(
    state: &AppState,
    job: &Job,
    mode: PipelineMode,
    final_clips: Option<Vec<FinalClipRange>>,
) -> ApiResult<()> {
    let video_gcs_uri = job
        .video_gcs_uri
        .clone()
        .ok_or_else(|| ApiError::bad_request("job has no videoGcsUri"))?;

    let mut envelope = JobEnvelope::new(job.job_id.clone(), video_gcs_uri, &state.config.output_bucket, mode);
    if let Some(uid) = &job.user_id {
        envelope = envelope.with_user(uid.clone());
    }
    if let Some(email) = &job.owner_email {
        envelope = envelope.with_owner_email(email.clone());
    }
    envelope = envelope.with_visibility(job.visibility);
    if let Some(clips) = final_clips {
        envelope = envelope.with_final_clips(clips);
    }

    state.queue.publish(&envelope).await?;
    Ok(())
}

async fn mark_publish_error(state: &AppState, job: &mut Job, status: hoop_models::job::JobStatus) {
    job.status = status;
    job.updated_at = Utc::now();
    let _ = state.jobs.update(job).await;
}
