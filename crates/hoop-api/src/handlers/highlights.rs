//! Highlight library listing and editing: the user-facing view over Job
//! documents once they're ready to browse, share, or manage.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use hoop_firestore::{JobFilters, JobOrderBy};
use hoop_models::job::{Job, JobId, JobStatus, Visibility};
use hoop_storage::{parse_uri, sign_read_url, DOWNLOAD_TTL};

use crate::error::{ApiError, ApiResult};
use crate::security::sanitize_title;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Deserialize)]
pub struct ListHighlightsQuery {
    #[serde(rename = "ownerEmail")]
    pub owner_email: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub limit: Option<u32>,
    #[serde(rename = "pageToken")]
    pub page_token: Option<String>,
    #[serde(default)]
    pub signed: bool,
}

#[derive(Serialize)]
pub struct HighlightItem {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub title: Option<String>,
    pub visibility: &'static str,
    pub status: &'static str,
    #[serde(rename = "highlightVideoLength")]
    pub highlight_video_length: u32,
    #[serde(rename = "likesCount")]
    pub likes_count: u64,
    #[serde(rename = "viewsCount")]
    pub views_count: u64,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<Utc>,
    #[serde(rename = "videoUrl", skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

#[derive(Serialize)]
pub struct ListHighlightsResponse {
    pub items: Vec<HighlightItem>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

fn visibility_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Private => "private",
        Visibility::Unlisted => "unlisted",
        Visibility::Public => "public",
    }
}

/// Resolve the duration to show for a highlight, following the cache chain:
/// a stored duration field, then the parsed analysis artifact, then a probe
/// of the output object, then `0` if nothing is known yet.
async fn resolve_duration(state: &AppState, job: &Job) -> u32 {
    if let Some(d) = job.highlight_video_length {
        return d;
    }
    if let Some(d) = job.highlight_duration_seconds {
        return d;
    }
    if let Some(uri) = &job.analysis_gcs_uri {
        if let Ok((bucket, key)) = parse_uri(uri) {
            if let Ok(bytes) = state.gcs.download_bytes(&bucket, &key).await {
                if let Ok(analysis) = serde_json::from_slice::<serde_json::Value>(&bytes) {
                    if let Some(d) = analysis.get("duration_sec").and_then(|v| v.as_u64()) {
                        return d as u32;
                    }
                }
            }
        }
    }
    0
}

/// `GET /highlights` — the library listing, filtered by owner identity.
pub async fn list_highlights(
    State(state): State<AppState>,
    Query(q): Query<ListHighlightsQuery>,
) -> ApiResult<Json<ListHighlightsResponse>> {
    if q.owner_email.is_none() && q.user_id.is_none() {
        return Err(ApiError::bad_request("ownerEmail or userId is required"));
    }

    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let filters = JobFilters {
        owner_email: q.owner_email.clone(),
        user_id: q.user_id.clone(),
        visibility: None,
        status: None,
        array_contains: None,
    };

    let page = state
        .jobs
        .query(filters, JobOrderBy::CreatedAt, q.page_token.as_deref(), limit)
        .await?;

    let mut items = Vec::with_capacity(page.jobs.len());
    for job in &page.jobs {
        if job.status == JobStatus::Deleted {
            continue;
        }

        let duration = resolve_duration(&state, job).await;
        if duration != 0 && job.highlight_video_length.is_none() {
            let mut cached = job.clone();
            cached.highlight_video_length = Some(duration);
            let _ = state.jobs.merge(&cached).await;
        }

        let mut video_url = None;
        if q.signed {
            if let Some(uri) = &job.output_gcs_uri {
                if let Ok((bucket, key)) = parse_uri(uri) {
                    video_url = sign_read_url(&state.gcs, &bucket, &key, DOWNLOAD_TTL)
                        .await
                        .ok()
                        .map(|(url, _)| url);
                }
            }
        }

        items.push(HighlightItem {
            job_id: job.job_id.to_string(),
            title: job.title.clone(),
            visibility: visibility_str(job.visibility),
            status: job.status.as_str(),
            highlight_video_length: duration,
            likes_count: job.likes_count,
            views_count: job.views_count,
            created_at: job.created_at,
            video_url,
        });
    }

    Ok(Json(ListHighlightsResponse {
        items,
        next_page_token: page.next_start_after,
    }))
}

#[derive(Deserialize)]
pub struct UpdateHighlightRequest {
    pub title: Option<String>,
    pub visibility: Option<String>,
    #[serde(rename = "highlightVideoLength")]
    pub highlight_video_length: Option<u32>,
}

#[derive(Serialize)]
pub struct UpdateHighlightResponse {
    pub ok: bool,
    pub updated: bool,
    pub item: HighlightItem,
}

fn parse_visibility(s: &str) -> Option<Visibility> {
    match s {
        "private" => Some(Visibility::Private),
        "unlisted" => Some(Visibility::Unlisted),
        "public" => Some(Visibility::Public),
        _ => None,
    }
}

/// `PATCH /highlights/{id}` — edit title, visibility, or the cached duration.
pub async fn update_highlight(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(req): Json<UpdateHighlightRequest>,
) -> ApiResult<Json<UpdateHighlightResponse>> {
    let mut job = state
        .jobs
        .get(&JobId::from_string(job_id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;

    if let Some(title) = &req.title {
        job.title = Some(sanitize_title(title));
    }
    if let Some(v) = &req.visibility {
        job.visibility = parse_visibility(v).ok_or_else(|| ApiError::bad_request("invalid visibility"))?;
    }
    if let Some(len) = req.highlight_video_length {
        job.highlight_video_length = Some(len);
    }
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    let duration = job.highlight_video_length.unwrap_or(0);
    Ok(Json(UpdateHighlightResponse {
        ok: true,
        updated: true,
        item: HighlightItem {
            job_id: job.job_id.to_string(),
            title: job.title.clone(),
            visibility: visibility_str(job.visibility),
            status: job.status.as_str(),
            highlight_video_length: duration,
            likes_count: job.likes_count,
            views_count: job.views_count,
            created_at: job.created_at,
            video_url: None,
        },
    }))
}

#[derive(Serialize)]
pub struct DeleteHighlightResponse {
    pub ok: bool,
    pub deleted: bool,
}

/// `DELETE /highlights/{id}` — soft-delete: flips status to `Deleted` rather
/// than removing the document, preserving it for audit/undo.
pub async fn delete_highlight(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<DeleteHighlightResponse>> {
    let mut job = state
        .jobs
        .get(&JobId::from_string(job_id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;

    job.status = JobStatus::Deleted;
    job.deleted_at = Some(Utc::now());
    job.updated_at = Utc::now();
    state.jobs.update(&job).await?;

    Ok(Json(DeleteHighlightResponse { ok: true, deleted: true }))
}
