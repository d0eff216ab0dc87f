//! Application state.

use std::sync::Arc;

use hoop_firestore::{FirestoreClient, JobRepository};
use hoop_queue::JobQueue;
use hoop_storage::GcsClient;

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::ratelimit::RateLimiter;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub gcs: GcsClient,
    pub jobs: JobRepository,
    pub queue: Arc<JobQueue>,
    pub upload_limiter: RateLimiter,
}

impl AppState {
    /// Create new application state. Fails fast: any adapter that can't even
    /// construct its client (bad credentials, unreachable Redis URL format)
    /// should stop startup rather than fail on the first request.
    pub async fn new(config: ApiConfig) -> ApiResult<Self> {
        let gcs = GcsClient::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        let queue = JobQueue::from_env()?;
        queue.init().await?;

        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let upload_limiter = RateLimiter::new(&redis_url, config.upload_rate_limit_per_minute)?;

        Ok(Self {
            config,
            gcs,
            jobs: JobRepository::new(firestore),
            queue: Arc::new(queue),
            upload_limiter,
        })
    }
}
