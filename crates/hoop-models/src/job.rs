//! The Job entity: one per uploaded video, durable in the document store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::timestamp::RawTimestamp;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The pipeline variant a Worker run executes for a Job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Full analyze-then-render pipeline.
    #[default]
    Analysis,
    /// Defers rendering; emits shot events only.
    Vertex,
    /// Renders a final video from user-edited clip ranges, skipping analysis.
    Render,
    /// Legacy variant retained for envelopes published before the mode field existed.
    Old,
}

/// Visibility of a finished highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

/// Durable job status. Transitions move forward only (see module docs on `Job`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    UploadPending,
    Uploading,
    Queued,
    Processing,
    Rendering,
    Done,
    Ready,
    Error,
    PublishError,
    RenderPublishError,
    Deleted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadPending => "upload_pending",
            Self::Uploading => "uploading",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Rendering => "rendering",
            Self::Done => "done",
            Self::Ready => "ready",
            Self::Error => "error",
            Self::PublishError => "publish_error",
            Self::RenderPublishError => "render_publish_error",
            Self::Deleted => "deleted",
        }
    }

    /// True once no further Worker transition is expected (soft-delete aside).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Ready | Self::Error | Self::PublishError | Self::RenderPublishError | Self::Deleted
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shot outcome as recorded by the Analyzer or edited by a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    Make,
    Miss,
    #[default]
    Undetermined,
    Other,
}

impl ShotOutcome {
    /// Map a free-form outcome string (lowercased) to a canonical outcome,
    /// following the synonym table the analyzer is expected to produce.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "make" | "made" => Self::Make,
            "miss" | "missed" => Self::Miss,
            "undetermined" => Self::Undetermined,
            _ => Self::Other,
        }
    }
}

/// A single detected (or manually added) shot event on a Job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShotEvent {
    /// Unique within the owning job.
    pub id: u32,
    /// Start of the event, canonical integer seconds.
    pub timestamp_start: u32,
    /// End of the event, canonical integer seconds.
    pub timestamp_end: u32,
    pub outcome: ShotOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_location: Option<String>,
    #[serde(default = "default_true")]
    pub show: bool,
    #[serde(default)]
    pub deleted: bool,
}

fn default_true() -> bool {
    true
}

impl ShotEvent {
    pub fn is_make(&self) -> bool {
        !self.deleted && self.show && self.outcome == ShotOutcome::Make
    }
}

/// Wire shape of one analyzer-produced event, before ids are assigned and
/// before timestamps are normalized. Tolerates all schema variants the
/// analyzer's prompt has been observed to produce (see the analyzer crate).
#[derive(Debug, Clone, Deserialize)]
pub struct RawShotEvent {
    #[serde(alias = "TimeStamp", alias = "TS")]
    pub timestamp_start: RawTimestamp,
    #[serde(alias = "TimeStampEnd", default)]
    pub timestamp_end: Option<RawTimestamp>,
    #[serde(alias = "Outcome", alias = "MM", default)]
    pub outcome: Option<String>,
    #[serde(alias = "Subject", alias = "SR", default)]
    pub subject: Option<String>,
    #[serde(alias = "ShotType", alias = "ST", default)]
    pub shot_type: Option<String>,
    #[serde(alias = "Location", alias = "SL", default)]
    pub shot_location: Option<String>,
}

/// The durable per-video job record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub job_id: JobId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,

    pub status: JobStatus,
    #[serde(default)]
    pub mode: PipelineMode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_gcs_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_gcs_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_gcs_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,

    #[serde(default)]
    pub shot_events: Vec<ShotEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_sec: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_video_length: Option<u32>,

    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub views_count: u64,
    #[serde(default)]
    pub liked_by_emails: HashSet<String>,

    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_viewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_liked_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a freshly-ingested job, not yet published to the queue.
    pub fn new_upload(
        original_file_name: impl Into<String>,
        user_id: Option<String>,
        owner_email: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            user_id,
            owner_email,
            status: JobStatus::UploadPending,
            mode: PipelineMode::Analysis,
            original_file_name: Some(original_file_name.into()),
            title: None,
            visibility: Visibility::Private,
            video_gcs_uri: None,
            output_gcs_uri: None,
            analysis_gcs_uri: None,
            final_video_url: None,
            shot_events: Vec::new(),
            video_duration_sec: None,
            highlight_duration_seconds: None,
            highlight_video_length: None,
            likes_count: 0,
            views_count: 0,
            liked_by_emails: HashSet::new(),
            created_at: now,
            queued_at: None,
            started_at: None,
            finished_at: None,
            updated_at: now,
            deleted_at: None,
            last_viewed_at: None,
            last_liked_at: None,
            error: None,
        }
    }

    /// Whether this job is a safe no-op target for a redelivered envelope:
    /// any terminal write already committed means reprocessing would be wasted
    /// work at best and a duplicate side effect at worst.
    pub fn is_already_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Done | JobStatus::Error | JobStatus::Deleted
        )
    }

    pub fn is_owned_by(&self, user_id: Option<&str>, email: Option<&str>) -> bool {
        (user_id.is_some() && self.user_id.as_deref() == user_id)
            || (email.is_some() && self.owner_email.as_deref() == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_upload_starts_in_upload_pending() {
        let job = Job::new_upload("clip.mp4", Some("u1".into()), None);
        assert_eq!(job.status, JobStatus::UploadPending);
        assert!(!job.is_already_terminal());
    }

    #[test]
    fn terminal_statuses_short_circuit_redelivery() {
        let mut job = Job::new_upload("clip.mp4", None, Some("a@x.com".into()));
        job.status = JobStatus::Done;
        assert!(job.is_already_terminal());
        job.status = JobStatus::Processing;
        assert!(!job.is_already_terminal());
    }

    #[test]
    fn shot_outcome_synonyms_normalize() {
        assert_eq!(ShotOutcome::from_raw("Made"), ShotOutcome::Make);
        assert_eq!(ShotOutcome::from_raw("MISSED"), ShotOutcome::Miss);
        assert_eq!(ShotOutcome::from_raw("unknown"), ShotOutcome::Other);
    }

    #[test]
    fn raw_shot_event_tolerates_abbreviated_schema() {
        let json = r#"{"TS": 47, "MM": "Make"}"#;
        let raw: RawShotEvent = serde_json::from_str(json).unwrap();
        assert_eq!(raw.timestamp_start.into_seconds().unwrap(), 47);
        assert_eq!(raw.outcome.as_deref(), Some("Make"));
    }

    #[test]
    fn raw_shot_event_tolerates_rich_schema() {
        let json = r#"{"Subject":"#23","Location":"paint","ShotType":"Layup","TimeStamp":"01:45","Outcome":"Miss"}"#;
        let raw: RawShotEvent = serde_json::from_str(json).unwrap();
        assert_eq!(raw.timestamp_start.into_seconds().unwrap(), 105);
        assert_eq!(raw.shot_type.as_deref(), Some("Layup"));
    }
}
