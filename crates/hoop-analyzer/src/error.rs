//! Error types for the shot analyzer client.

use thiserror::Error;

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("analyzer request failed: {0}")]
    RequestFailed(String),

    #[error("analyzer upstream returned {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("file upload to analyzer failed: {0}")]
    UploadFailed(String),

    #[error("uploaded file reached failed state before analysis")]
    FileProcessingFailed,

    #[error("analyzer response was not valid JSON after fence-stripping: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("analyzer is not configured: {0}")]
    Config(String),
}

impl AnalyzerError {
    /// Transport errors, 503/UNAVAILABLE, and timeouts are retried by the caller;
    /// malformed JSON and non-429 4xx responses fail fast.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) => true,
            Self::UpstreamError { status, body } => {
                *status == 503 || *status == 429 || body.contains("UNAVAILABLE")
            }
            _ => false,
        }
    }
}
