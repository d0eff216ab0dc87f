//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("AI analysis failed: {0}")]
    AiFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue operation failed: {0}")]
    QueueFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] hoop_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] hoop_firestore::FirestoreError),

    #[error("Media error: {0}")]
    Media(#[from] hoop_media::MediaError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] hoop_analyzer::AnalyzerError),

    #[error("Planner error: {0}")]
    Planner(#[from] hoop_planner::PlannerError),

    #[error("Queue error: {0}")]
    Queue(#[from] hoop_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn ai_failed(msg: impl Into<String>) -> Self {
        Self::AiFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn queue_failed(msg: impl Into<String>) -> Self {
        Self::QueueFailed(msg.into())
    }

    /// Whether the failing sub-step is worth an internal retry. Irrelevant to
    /// the outer job loop, which writes `status=error` and acks regardless of
    /// this — used only by adapters that retry their own calls.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::DownloadFailed(_)
                | WorkerError::UploadFailed(_)
                | WorkerError::Storage(_)
                | WorkerError::Firestore(_)
                | WorkerError::AiFailed(_)
        )
    }
}
