//! Repository for the Job document: the durable state machine every API
//! handler and Worker stage reads and writes.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::info;

use hoop_models::job::{Job, JobId, JobStatus, PipelineMode, ShotEvent, Visibility};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    and_filters, ArrayValue, FieldFilter, FieldTransform, FromFirestoreValue, MapValue, Order,
    StructuredQuery, ToFirestoreValue, Value, Write,
};

const COLLECTION: &str = "jobs";

/// Equality/membership filters accepted by [`JobRepository::query`].
#[derive(Debug, Clone, Default)]
pub struct JobFilters {
    pub owner_email: Option<String>,
    pub user_id: Option<String>,
    pub visibility: Option<Visibility>,
    pub status: Option<JobStatus>,
    /// Generic `array_contains` filter, e.g. membership on an auxiliary
    /// collaborator list. Unused by the Job entity itself today; present so
    /// the store's contract isn't narrower than what Firestore supports.
    pub array_contains: Option<(String, String)>,
}

/// Sort field for [`JobRepository::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrderBy {
    CreatedAt,
    FinishedAt,
}

impl JobOrderBy {
    fn field_path(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::FinishedAt => "finished_at",
        }
    }
}

/// One page of a [`JobRepository::query`] call.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    /// Document id of the last item, to pass back as `start_after` for the
    /// next page. `None` once the result set is shorter than the limit.
    pub next_start_after: Option<String>,
}

/// Repository for the Job document store.
#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
}

impl JobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Fetch a job by id.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<Job>> {
        let doc = self.client.get_document(COLLECTION, job_id.as_str()).await?;
        match doc {
            Some(d) => Ok(Some(document_to_job(&d)?)),
            None => Ok(None),
        }
    }

    /// Upsert semantics: unset fields on `job` are not cleared, since only
    /// the fields Serde actually emits (the ones set on `job`) are written
    /// with an explicit update mask. Creates the document if absent.
    pub async fn merge(&self, job: &Job) -> FirestoreResult<()> {
        let fields = job_to_fields(job);
        let mask: Vec<String> = fields.keys().cloned().collect();

        match self
            .client
            .update_document(COLLECTION, job.job_id.as_str(), fields.clone(), Some(mask))
            .await
        {
            Ok(_) => {
                info!("merged job {}", job.job_id);
                Ok(())
            }
            Err(FirestoreError::NotFound(_)) => {
                self.client
                    .create_document(COLLECTION, job.job_id.as_str(), fields)
                    .await?;
                info!("created job {}", job.job_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Same merge semantics as [`Self::merge`], but fails with `NotFound`
    /// instead of creating the document. Used by handlers that must not
    /// resurrect a deleted or never-created job.
    pub async fn update(&self, job: &Job) -> FirestoreResult<()> {
        let fields = job_to_fields(job);
        let mask: Vec<String> = fields.keys().cloned().collect();
        self.client
            .update_document(COLLECTION, job.job_id.as_str(), fields, Some(mask))
            .await?;
        Ok(())
    }

    /// Atomically add `delta` to `likes_count` or `views_count` and bump
    /// `updated_at`, without a read-modify-write round trip.
    pub async fn increment_counter(&self, job_id: &JobId, field: &str, delta: i64) -> FirestoreResult<()> {
        let write = Write {
            update: Some(crate::types::Document {
                name: None,
                fields: Some(HashMap::from([(
                    "updated_at".to_string(),
                    Utc::now().to_firestore_value(),
                )])),
                create_time: None,
                update_time: None,
            }),
            delete: None,
            update_mask: Some(crate::types::DocumentMask {
                field_paths: vec!["updated_at".to_string()],
            }),
            update_transforms: Some(vec![FieldTransform::increment(field, delta)]),
            current_document: Some(crate::types::Precondition {
                exists: Some(true),
                update_time: None,
            }),
        };
        self.write_one(job_id, write).await
    }

    /// Atomically add `email` to `liked_by_emails`.
    pub async fn add_liked_by(&self, job_id: &JobId, email: &str) -> FirestoreResult<()> {
        let write = Write {
            update: None,
            delete: None,
            update_mask: None,
            update_transforms: Some(vec![FieldTransform::append_missing_elements(
                "liked_by_emails",
                vec![Value::StringValue(email.to_string())],
            )]),
            current_document: Some(crate::types::Precondition {
                exists: Some(true),
                update_time: None,
            }),
        };
        self.write_one(job_id, write).await
    }

    /// Atomically remove `email` from `liked_by_emails`.
    pub async fn remove_liked_by(&self, job_id: &JobId, email: &str) -> FirestoreResult<()> {
        let write = Write {
            update: None,
            delete: None,
            update_mask: None,
            update_transforms: Some(vec![FieldTransform::remove_all_from_array(
                "liked_by_emails",
                vec![Value::StringValue(email.to_string())],
            )]),
            current_document: Some(crate::types::Precondition {
                exists: Some(true),
                update_time: None,
            }),
        };
        self.write_one(job_id, write).await
    }

    async fn write_one(&self, job_id: &JobId, write: Write) -> FirestoreResult<()> {
        let name = self.client.full_document_name(COLLECTION, job_id.as_str());
        let mut write = write;
        if let Some(doc) = write.update.as_mut() {
            doc.name = Some(name.clone());
        } else {
            // A transform-only write still needs to name its target document
            // via the embedded `update`'s name field; Firestore's batchWrite
            // accepts a bare `update_transforms` entry only when paired with
            // an (empty) `update` carrying the document name.
            write.update = Some(crate::types::Document {
                name: Some(name),
                fields: Some(HashMap::new()),
                create_time: None,
                update_time: None,
            });
            write.update_mask = Some(crate::types::DocumentMask { field_paths: vec![] });
        }

        self.client.batch_write(vec![write]).await?.check_for_errors()
    }

    /// Query jobs by equality/membership filters, ordered and paginated.
    pub async fn query(
        &self,
        filters: JobFilters,
        order_by: JobOrderBy,
        start_after: Option<&str>,
        limit: u32,
    ) -> FirestoreResult<JobPage> {
        let mut predicates = Vec::new();
        if let Some(v) = &filters.owner_email {
            predicates.push(FieldFilter::equal("owner_email", v.to_firestore_value()));
        }
        if let Some(v) = &filters.user_id {
            predicates.push(FieldFilter::equal("user_id", v.to_firestore_value()));
        }
        if let Some(v) = filters.visibility {
            predicates.push(FieldFilter::equal(
                "visibility",
                visibility_str(v).to_firestore_value(),
            ));
        }
        if let Some(v) = filters.status {
            predicates.push(FieldFilter::equal("status", v.as_str().to_firestore_value()));
        }
        if let Some((field, value)) = &filters.array_contains {
            predicates.push(FieldFilter::array_contains(field.clone(), value.to_firestore_value()));
        }

        let mut query = StructuredQuery {
            from: vec![crate::types::CollectionSelector {
                collection_id: COLLECTION.to_string(),
                all_descendants: None,
            }],
            r#where: and_filters(predicates),
            order_by: Some(vec![
                Order {
                    field: crate::types::FieldReference {
                        field_path: order_by.field_path().to_string(),
                    },
                    direction: "DESCENDING".to_string(),
                },
                Order {
                    field: crate::types::FieldReference {
                        field_path: "__name__".to_string(),
                    },
                    direction: "DESCENDING".to_string(),
                },
            ]),
            start_at: None,
            limit: Some((limit + 1) as i32),
        };

        if let Some(after_id) = start_after {
            // start_after is keyed by document id; resolve its sort value by
            // reading the document itself so pagination stays correct
            // regardless of which field the caller is ordering by.
            if let Some(after_doc) = self.client.get_document(COLLECTION, after_id).await? {
                let sort_value = after_doc
                    .fields
                    .as_ref()
                    .and_then(|f| f.get(order_by.field_path()))
                    .cloned()
                    .unwrap_or(Value::NullValue(()));
                let name = self.client.full_document_name(COLLECTION, after_id);
                query.start_at = Some(crate::types::Cursor {
                    values: vec![sort_value, Value::ReferenceValue(name)],
                    before: Some(false),
                });
            }
        }

        let mut docs = self.client.run_query(query).await?;
        let has_more = docs.len() > limit as usize;
        docs.truncate(limit as usize);

        let jobs = docs
            .iter()
            .map(document_to_job)
            .collect::<FirestoreResult<Vec<_>>>()?;

        let next_start_after = if has_more {
            jobs.last().map(|j| j.job_id.as_str().to_string())
        } else {
            None
        };

        Ok(JobPage { jobs, next_start_after })
    }
}

fn visibility_str(v: Visibility) -> &'static str {
    match v {
        Visibility::Private => "private",
        Visibility::Unlisted => "unlisted",
        Visibility::Public => "public",
    }
}

fn visibility_from_str(s: &str) -> Visibility {
    match s {
        "unlisted" => Visibility::Unlisted,
        "public" => Visibility::Public,
        _ => Visibility::Private,
    }
}

fn mode_str(m: PipelineMode) -> &'static str {
    match m {
        PipelineMode::Analysis => "analysis",
        PipelineMode::Vertex => "vertex",
        PipelineMode::Render => "render",
        PipelineMode::Old => "old",
    }
}

fn mode_from_str(s: &str) -> PipelineMode {
    match s {
        "vertex" => PipelineMode::Vertex,
        "render" => PipelineMode::Render,
        "old" => PipelineMode::Old,
        _ => PipelineMode::Analysis,
    }
}

fn status_from_str(s: &str) -> JobStatus {
    match s {
        "uploading" => JobStatus::Uploading,
        "queued" => JobStatus::Queued,
        "processing" => JobStatus::Processing,
        "rendering" => JobStatus::Rendering,
        "done" => JobStatus::Done,
        "ready" => JobStatus::Ready,
        "error" => JobStatus::Error,
        "publish_error" => JobStatus::PublishError,
        "render_publish_error" => JobStatus::RenderPublishError,
        "deleted" => JobStatus::Deleted,
        _ => JobStatus::UploadPending,
    }
}

fn shot_event_to_value(event: &ShotEvent) -> Value {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), event.id.to_firestore_value());
    fields.insert("timestamp_start".to_string(), event.timestamp_start.to_firestore_value());
    fields.insert("timestamp_end".to_string(), event.timestamp_end.to_firestore_value());
    fields.insert(
        "outcome".to_string(),
        outcome_str(event.outcome).to_firestore_value(),
    );
    if let Some(ref subject) = event.subject {
        fields.insert("subject".to_string(), subject.to_firestore_value());
    }
    if let Some(ref shot_type) = event.shot_type {
        fields.insert("shot_type".to_string(), shot_type.to_firestore_value());
    }
    if let Some(ref shot_location) = event.shot_location {
        fields.insert("shot_location".to_string(), shot_location.to_firestore_value());
    }
    fields.insert("show".to_string(), event.show.to_firestore_value());
    fields.insert("deleted".to_string(), event.deleted.to_firestore_value());
    Value::MapValue(MapValue { fields: Some(fields) })
}

fn outcome_str(o: hoop_models::job::ShotOutcome) -> &'static str {
    use hoop_models::job::ShotOutcome;
    match o {
        ShotOutcome::Make => "make",
        ShotOutcome::Miss => "miss",
        ShotOutcome::Undetermined => "undetermined",
        ShotOutcome::Other => "other",
    }
}

fn value_to_shot_event(value: &Value) -> Option<ShotEvent> {
    let Value::MapValue(MapValue { fields: Some(fields) }) = value else {
        return None;
    };
    use hoop_models::job::ShotOutcome;
    let outcome = fields
        .get("outcome")
        .and_then(String::from_firestore_value)
        .map(|s| match s.as_str() {
            "make" => ShotOutcome::Make,
            "miss" => ShotOutcome::Miss,
            "other" => ShotOutcome::Other,
            _ => ShotOutcome::Undetermined,
        })
        .unwrap_or_default();

    Some(ShotEvent {
        id: fields.get("id").and_then(u32::from_firestore_value).unwrap_or(0),
        timestamp_start: fields
            .get("timestamp_start")
            .and_then(u32::from_firestore_value)
            .unwrap_or(0),
        timestamp_end: fields
            .get("timestamp_end")
            .and_then(u32::from_firestore_value)
            .unwrap_or(0),
        outcome,
        subject: fields.get("subject").and_then(String::from_firestore_value),
        shot_type: fields.get("shot_type").and_then(String::from_firestore_value),
        shot_location: fields.get("shot_location").and_then(String::from_firestore_value),
        show: fields.get("show").and_then(bool::from_firestore_value).unwrap_or(true),
        deleted: fields.get("deleted").and_then(bool::from_firestore_value).unwrap_or(false),
    })
}

fn job_to_fields(job: &Job) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("job_id".to_string(), job.job_id.as_str().to_firestore_value());
    if let Some(ref v) = job.user_id {
        fields.insert("user_id".to_string(), v.to_firestore_value());
    }
    if let Some(ref v) = job.owner_email {
        fields.insert("owner_email".to_string(), v.to_firestore_value());
    }
    fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
    fields.insert("mode".to_string(), mode_str(job.mode).to_firestore_value());
    if let Some(ref v) = job.original_file_name {
        fields.insert("original_file_name".to_string(), v.to_firestore_value());
    }
    if let Some(ref v) = job.title {
        fields.insert("title".to_string(), v.to_firestore_value());
    }
    fields.insert("visibility".to_string(), visibility_str(job.visibility).to_firestore_value());
    if let Some(ref v) = job.video_gcs_uri {
        fields.insert("video_gcs_uri".to_string(), v.to_firestore_value());
    }
    if let Some(ref v) = job.output_gcs_uri {
        fields.insert("output_gcs_uri".to_string(), v.to_firestore_value());
    }
    if let Some(ref v) = job.analysis_gcs_uri {
        fields.insert("analysis_gcs_uri".to_string(), v.to_firestore_value());
    }
    if let Some(ref v) = job.final_video_url {
        fields.insert("final_video_url".to_string(), v.to_firestore_value());
    }
    fields.insert(
        "shot_events".to_string(),
        Value::ArrayValue(ArrayValue {
            values: Some(job.shot_events.iter().map(shot_event_to_value).collect()),
        }),
    );
    if let Some(v) = job.video_duration_sec {
        fields.insert("video_duration_sec".to_string(), v.to_firestore_value());
    }
    if let Some(v) = job.highlight_duration_seconds {
        fields.insert("highlight_duration_seconds".to_string(), v.to_firestore_value());
    }
    if let Some(v) = job.highlight_video_length {
        fields.insert("highlight_video_length".to_string(), v.to_firestore_value());
    }
    fields.insert("likes_count".to_string(), job.likes_count.to_firestore_value());
    fields.insert("views_count".to_string(), job.views_count.to_firestore_value());
    fields.insert(
        "liked_by_emails".to_string(),
        Value::ArrayValue(ArrayValue {
            values: Some(
                job.liked_by_emails
                    .iter()
                    .map(|e| e.to_firestore_value())
                    .collect(),
            ),
        }),
    );
    fields.insert("created_at".to_string(), job.created_at.to_firestore_value());
    if let Some(v) = job.queued_at {
        fields.insert("queued_at".to_string(), v.to_firestore_value());
    }
    if let Some(v) = job.started_at {
        fields.insert("started_at".to_string(), v.to_firestore_value());
    }
    if let Some(v) = job.finished_at {
        fields.insert("finished_at".to_string(), v.to_firestore_value());
    }
    fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());
    if let Some(v) = job.deleted_at {
        fields.insert("deleted_at".to_string(), v.to_firestore_value());
    }
    if let Some(v) = job.last_viewed_at {
        fields.insert("last_viewed_at".to_string(), v.to_firestore_value());
    }
    if let Some(v) = job.last_liked_at {
        fields.insert("last_liked_at".to_string(), v.to_firestore_value());
    }
    if let Some(ref v) = job.error {
        fields.insert("error".to_string(), v.to_firestore_value());
    }
    fields
}

fn document_to_job(doc: &crate::types::Document) -> FirestoreResult<Job> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::InvalidResponse("document has no fields".to_string()))?;

    let job_id = fields
        .get("job_id")
        .and_then(String::from_firestore_value)
        .map(JobId::from_string)
        .ok_or_else(|| FirestoreError::InvalidResponse("missing job_id".to_string()))?;

    let status = fields
        .get("status")
        .and_then(String::from_firestore_value)
        .map(|s| status_from_str(&s))
        .unwrap_or_default();

    let mode = fields
        .get("mode")
        .and_then(String::from_firestore_value)
        .map(|s| mode_from_str(&s))
        .unwrap_or_default();

    let visibility = fields
        .get("visibility")
        .and_then(String::from_firestore_value)
        .map(|s| visibility_from_str(&s))
        .unwrap_or_default();

    let shot_events = fields
        .get("shot_events")
        .and_then(|v| match v {
            Value::ArrayValue(ArrayValue { values: Some(values) }) => Some(values),
            _ => None,
        })
        .map(|values| values.iter().filter_map(value_to_shot_event).collect())
        .unwrap_or_default();

    let liked_by_emails: HashSet<String> = fields
        .get("liked_by_emails")
        .and_then(|v| match v {
            Value::ArrayValue(ArrayValue { values: Some(values) }) => Some(values),
            _ => None,
        })
        .map(|values| values.iter().filter_map(String::from_firestore_value).collect())
        .unwrap_or_default();

    let now = Utc::now();
    let get_time = |key: &str| -> Option<DateTime<Utc>> {
        fields.get(key).and_then(DateTime::<Utc>::from_firestore_value)
    };

    Ok(Job {
        job_id,
        user_id: fields.get("user_id").and_then(String::from_firestore_value),
        owner_email: fields.get("owner_email").and_then(String::from_firestore_value),
        status,
        mode,
        original_file_name: fields.get("original_file_name").and_then(String::from_firestore_value),
        title: fields.get("title").and_then(String::from_firestore_value),
        visibility,
        video_gcs_uri: fields.get("video_gcs_uri").and_then(String::from_firestore_value),
        output_gcs_uri: fields.get("output_gcs_uri").and_then(String::from_firestore_value),
        analysis_gcs_uri: fields.get("analysis_gcs_uri").and_then(String::from_firestore_value),
        final_video_url: fields.get("final_video_url").and_then(String::from_firestore_value),
        shot_events,
        video_duration_sec: fields.get("video_duration_sec").and_then(u32::from_firestore_value),
        highlight_duration_seconds: fields
            .get("highlight_duration_seconds")
            .and_then(u32::from_firestore_value),
        highlight_video_length: fields.get("highlight_video_length").and_then(u32::from_firestore_value),
        likes_count: fields.get("likes_count").and_then(u64::from_firestore_value).unwrap_or(0),
        views_count: fields.get("views_count").and_then(u64::from_firestore_value).unwrap_or(0),
        liked_by_emails,
        created_at: get_time("created_at").unwrap_or(now),
        queued_at: get_time("queued_at"),
        started_at: get_time("started_at"),
        finished_at: get_time("finished_at"),
        updated_at: get_time("updated_at").unwrap_or(now),
        deleted_at: get_time("deleted_at"),
        last_viewed_at: get_time("last_viewed_at"),
        last_liked_at: get_time("last_liked_at"),
        error: fields.get("error").and_then(String::from_firestore_value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoop_models::job::Job;

    #[test]
    fn job_round_trips_through_fields_and_back() {
        let mut job = Job::new_upload("clip.mp4", Some("u1".into()), Some("a@x.com".into()));
        job.status = JobStatus::Done;
        job.likes_count = 3;
        job.liked_by_emails.insert("b@x.com".into());

        let fields = job_to_fields(&job);
        let doc = crate::types::Document {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        };

        let round_tripped = document_to_job(&doc).unwrap();
        assert_eq!(round_tripped.job_id, job.job_id);
        assert_eq!(round_tripped.status, JobStatus::Done);
        assert_eq!(round_tripped.likes_count, 3);
        assert!(round_tripped.liked_by_emails.contains("b@x.com"));
    }

    #[test]
    fn missing_job_id_is_an_error() {
        let doc = crate::types::Document {
            name: None,
            fields: Some(HashMap::new()),
            create_time: None,
            update_time: None,
        };
        assert!(document_to_job(&doc).is_err());
    }
}
