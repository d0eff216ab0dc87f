//! The per-job state machine: consume → download → analyze → plan → render →
//! upload → commit, per §4.7/§4.9. One call processes exactly one envelope.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use hoop_models::job::{Job, JobStatus, PipelineMode};
use hoop_models::{RawShotEvent, ShotEvent, ShotOutcome};
use hoop_queue::JobEnvelope;
use hoop_storage::{format_uri, parse_uri};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

/// Process one envelope to completion. Never propagates a processing
/// failure past a job-level `status=error` write; the only `Err` this
/// returns is for conditions that prevent even writing that (job missing,
/// document-store unreachable), which the caller treats as a redelivery
/// candidate rather than a terminal failure.
pub async fn process_envelope(ctx: &WorkerContext, envelope: &JobEnvelope) -> WorkerResult<()> {
    let Some(job) = ctx.jobs.get(&envelope.job_id).await? else {
        warn!(job_id = %envelope.job_id, "envelope references a job that does not exist; dropping");
        return Ok(());
    };

    if job.is_already_terminal() {
        info!(job_id = %envelope.job_id, status = %job.status, "job already terminal, skipping redelivered envelope");
        return Ok(());
    }

    tokio::fs::create_dir_all(&ctx.config.work_dir)
        .await
        .map_err(WorkerError::Io)?;
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("{}-", envelope.job_id))
        .tempdir_in(&ctx.config.work_dir)
        .map_err(WorkerError::Io)?;

    let result = match envelope.mode {
        PipelineMode::Analysis | PipelineMode::Old => {
            run_analysis(ctx, envelope, job, work_dir.path(), true).await
        }
        PipelineMode::Vertex => run_analysis(ctx, envelope, job, work_dir.path(), false).await,
        PipelineMode::Render => run_render(ctx, envelope, job, work_dir.path()).await,
    };

    if let Err(e) = &result {
        warn!(job_id = %envelope.job_id, error = %e, "job processing failed, recording terminal error");
        mark_error(ctx, &envelope.job_id, &e.to_string()).await;
    }

    Ok(())
}

async fn mark_error(ctx: &WorkerContext, job_id: &hoop_models::job::JobId, message: &str) {
    if let Ok(Some(mut job)) = ctx.jobs.get(job_id).await {
        job.status = JobStatus::Error;
        job.error = Some(message.to_string());
        job.finished_at = Some(Utc::now());
        job.updated_at = Utc::now();
        if let Err(e) = ctx.jobs.update(&job).await {
            warn!(job_id = %job_id, error = %e, "failed to persist terminal error status");
        }
    }
}

/// `analysis` and `vertex` modes: download, analyze, write the analysis
/// artifact, and — only when `render_highlight` is set — plan and render
/// the highlight video.
async fn run_analysis(
    ctx: &WorkerContext,
    envelope: &JobEnvelope,
    mut job: Job,
    work_dir: &Path,
    render_highlight: bool,
) -> WorkerResult<()> {
    job.status = JobStatus::Processing;
    job.started_at = Some(Utc::now());
    job.updated_at = Utc::now();
    ctx.jobs.update(&job).await?;

    let (src_bucket, src_key) = parse_uri(&envelope.video_gcs_uri)?;
    let source_path = work_dir.join("source");
    ctx.gcs.download_file(&src_bucket, &src_key, &source_path).await?;

    let mp4_path = hoop_media::ensure_mp4(&source_path, work_dir).await?;
    let duration_sec = hoop_media::get_duration_secs_ceil(&mp4_path).await?;

    let raw_events = ctx
        .analyzer
        .analyze(&mp4_path, "video/mp4", duration_sec)
        .await?;
    let events = normalize_events(raw_events);

    let analysis_key = format!("{}/analysis.json", envelope.job_id);
    let analysis_bytes = serde_json::to_vec(&events)
        .map_err(|e| WorkerError::processing_failed(format!("encoding analysis artifact: {e}")))?;
    ctx.gcs
        .upload_bytes(&envelope.out_bucket, &analysis_key, analysis_bytes, "application/json")
        .await?;

    let duration_u32 = duration_sec.min(u32::MAX as u64) as u32;
    job.analysis_gcs_uri = Some(format_uri(&envelope.out_bucket, &analysis_key));
    job.shot_events = events.clone();
    job.video_duration_sec = Some(duration_u32);

    if render_highlight {
        let ranges = hoop_planner::plan_clips(&events, hoop_planner::PlannerConfig::default(), Some(duration_u32));

        if !ranges.is_empty() {
            let highlight_key = format!("{}/highlight.mp4", envelope.job_id);
            let highlight_path = render_ranges(&mp4_path, &ranges, work_dir).await?;
            ctx.gcs
                .upload_file(&envelope.out_bucket, &highlight_key, &highlight_path, "video/mp4")
                .await?;
            let rendered_duration = hoop_media::get_duration_secs_ceil(&highlight_path).await?;
            job.output_gcs_uri = Some(format_uri(&envelope.out_bucket, &highlight_key));
            job.highlight_duration_seconds = Some(rendered_duration.min(u32::MAX as u64) as u32);
        } else {
            info!(job_id = %envelope.job_id, "clip planner produced no ranges; marking done with no highlight");
        }
    }

    job.status = JobStatus::Done;
    job.finished_at = Some(Utc::now());
    job.updated_at = Utc::now();
    ctx.jobs.update(&job).await?;

    if ctx.config.delete_source_after_processing {
        if let Err(e) = ctx.gcs.delete_object(&src_bucket, &src_key).await {
            warn!(job_id = %envelope.job_id, error = %e, "failed to delete source blob after processing");
        }
    }

    Ok(())
}

/// `render` mode (§4.9): user-edited ranges, rendered in the order given —
/// no re-merging, the user's edits are authoritative.
async fn run_render(
    ctx: &WorkerContext,
    envelope: &JobEnvelope,
    mut job: Job,
    work_dir: &Path,
) -> WorkerResult<()> {
    let final_clips = envelope
        .final_clips
        .as_ref()
        .filter(|clips| !clips.is_empty())
        .ok_or_else(|| WorkerError::processing_failed("render envelope carries no final clips"))?;

    job.status = JobStatus::Rendering;
    job.started_at = Some(Utc::now());
    job.updated_at = Utc::now();
    ctx.jobs.update(&job).await?;

    let (src_bucket, src_key) = parse_uri(&envelope.video_gcs_uri)?;
    let source_path = work_dir.join("source");
    ctx.gcs.download_file(&src_bucket, &src_key, &source_path).await?;
    let mp4_path = hoop_media::ensure_mp4(&source_path, work_dir).await?;

    let mut clip_paths = Vec::with_capacity(final_clips.len());
    for (i, range) in final_clips.iter().enumerate() {
        let duration = (range.end - range.start).max(0.0);
        let clip_path = work_dir.join(format!("final-{i}.mp4"));
        hoop_media::extract_range(&mp4_path, range.start, duration, &clip_path).await?;
        clip_paths.push(clip_path);
    }

    let render_path = work_dir.join("final_render.mp4");
    hoop_media::concatenate(&clip_paths, &render_path).await?;

    let render_key = format!("{}/final_render.mp4", envelope.job_id);
    ctx.gcs
        .upload_file(&envelope.out_bucket, &render_key, &render_path, "video/mp4")
        .await?;

    job.final_video_url = Some(format_uri(&envelope.out_bucket, &render_key));
    job.status = JobStatus::Ready;
    job.finished_at = Some(Utc::now());
    job.updated_at = Utc::now();
    ctx.jobs.update(&job).await?;

    Ok(())
}

async fn render_ranges(
    src: &Path,
    ranges: &[hoop_planner::ClipRange],
    work_dir: &Path,
) -> WorkerResult<PathBuf> {
    let mut clip_paths = Vec::with_capacity(ranges.len());
    for (i, range) in ranges.iter().enumerate() {
        let clip_path = work_dir.join(format!("clip-{i}.mp4"));
        hoop_media::extract_range(src, range.start as f64, range.len() as f64, &clip_path).await?;
        clip_paths.push(clip_path);
    }

    let highlight_path = work_dir.join("highlight.mp4");
    hoop_media::concatenate(&clip_paths, &highlight_path).await?;
    Ok(highlight_path)
}

/// Assign sequential ids and normalize timestamps/outcome for a batch of
/// analyzer-produced events, dropping any whose timestamp fails to parse.
fn normalize_events(raw_events: Vec<RawShotEvent>) -> Vec<ShotEvent> {
    let mut events = Vec::with_capacity(raw_events.len());
    let mut next_id = 0u32;

    for raw in raw_events {
        let Ok(timestamp_start) = raw.timestamp_start.into_seconds() else {
            warn!("dropping shot event with unparseable timestamp");
            continue;
        };
        let timestamp_end = raw
            .timestamp_end
            .and_then(|t| t.into_seconds().ok())
            .unwrap_or(timestamp_start);

        events.push(ShotEvent {
            id: next_id,
            timestamp_start,
            timestamp_end,
            outcome: raw
                .outcome
                .as_deref()
                .map(ShotOutcome::from_raw)
                .unwrap_or_default(),
            subject: raw.subject,
            shot_type: raw.shot_type,
            shot_location: raw.shot_location,
            show: true,
            deleted: false,
        });
        next_id += 1;
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoop_models::job::RawTimestamp;

    fn raw(start: RawTimestamp, outcome: Option<&str>) -> RawShotEvent {
        RawShotEvent {
            timestamp_start: start,
            timestamp_end: None,
            outcome: outcome.map(str::to_string),
            subject: None,
            shot_type: None,
            shot_location: None,
        }
    }

    #[test]
    fn normalize_events_assigns_sequential_ids() {
        let raw_events = vec![
            raw(RawTimestamp::Integer(10), Some("make")),
            raw(RawTimestamp::Integer(20), Some("miss")),
        ];
        let events = normalize_events(raw_events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 0);
        assert_eq!(events[1].id, 1);
        assert!(events[0].is_make());
        assert!(!events[1].is_make());
    }

    #[test]
    fn normalize_events_drops_unparseable_timestamps() {
        let raw_events = vec![
            raw(RawTimestamp::Text("not-a-timestamp".to_string()), Some("make")),
            raw(RawTimestamp::Integer(5), Some("make")),
        ];
        let events = normalize_events(raw_events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, 0);
        assert_eq!(events[0].timestamp_start, 5);
    }

    #[test]
    fn normalize_events_defaults_end_to_start_when_missing() {
        let events = normalize_events(vec![raw(RawTimestamp::Integer(42), None)]);
        assert_eq!(events[0].timestamp_end, 42);
        assert_eq!(events[0].outcome, ShotOutcome::Undetermined);
    }
}
