//! The envelope published to the job stream and consumed by the Worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hoop_models::job::{JobId, PipelineMode, Visibility};

/// One user-edited clip range in `mode=render` envelopes, in fractional
/// seconds exactly as the client submitted them. Ranges are rendered in the
/// order given; the Worker never re-merges them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalClipRange {
    pub start: f64,
    pub end: f64,
}

/// One message on the job stream: everything the Worker needs to start
/// processing without a round trip to the document store first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    pub job_id: JobId,
    pub video_gcs_uri: String,
    pub out_bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub mode: PipelineMode,
    /// Present only for `mode=render` envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_clips: Option<Vec<FinalClipRange>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(
        job_id: JobId,
        video_gcs_uri: impl Into<String>,
        out_bucket: impl Into<String>,
        mode: PipelineMode,
    ) -> Self {
        Self {
            job_id,
            video_gcs_uri: video_gcs_uri.into(),
            out_bucket: out_bucket.into(),
            user_id: None,
            owner_email: None,
            visibility: None,
            mode,
            final_clips: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_final_clips(mut self, final_clips: Vec<FinalClipRange>) -> Self {
        self.final_clips = Some(final_clips);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_owner_email(mut self, owner_email: impl Into<String>) -> Self {
        self.owner_email = Some(owner_email.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Deduplication key: one job should never be published twice under the
    /// same id while an in-flight copy is still being processed.
    pub fn idempotency_key(&self) -> String {
        format!("job:{}", self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serde_roundtrip() {
        let envelope = JobEnvelope::new(
            JobId::new(),
            "gs://raw/uploads/clip.mp4",
            "hoop-output",
            PipelineMode::Analysis,
        )
        .with_user("user_1")
        .with_owner_email("a@x.com");

        let json = serde_json::to_string(&envelope).expect("serialize");
        let decoded: JobEnvelope = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(decoded.job_id, envelope.job_id);
        assert_eq!(decoded.video_gcs_uri, envelope.video_gcs_uri);
        assert_eq!(decoded.out_bucket, envelope.out_bucket);
        assert_eq!(decoded.user_id.as_deref(), Some("user_1"));
        assert_eq!(decoded.mode, PipelineMode::Analysis);
    }

    #[test]
    fn old_mode_envelopes_without_a_mode_field_default_to_old() {
        let json = r#"{"jobId":"j1","videoGcsUri":"gs://raw/a.mp4","outBucket":"out"}"#;
        let decoded: JobEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.mode, PipelineMode::Analysis);
    }

    #[test]
    fn idempotency_key_is_scoped_to_job_id() {
        let a = JobEnvelope::new(JobId::from_string("j1"), "gs://x", "out", PipelineMode::Render);
        let b = JobEnvelope::new(JobId::from_string("j2"), "gs://x", "out", PipelineMode::Render);
        assert_ne!(a.idempotency_key(), b.idempotency_key());
    }
}
