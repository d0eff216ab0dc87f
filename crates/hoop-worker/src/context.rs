//! Adapters the Worker needs to run a job: constructed once at startup from
//! validated configuration, then shared (`Arc`) across job slots.

use hoop_analyzer::AnalyzerClient;
use hoop_firestore::{FirestoreClient, JobRepository};
use hoop_storage::GcsClient;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

pub struct WorkerContext {
    pub config: WorkerConfig,
    pub gcs: GcsClient,
    pub jobs: JobRepository,
    pub analyzer: AnalyzerClient,
}

impl WorkerContext {
    pub async fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let gcs = GcsClient::from_env()
            .await
            .map_err(|e| crate::error::WorkerError::config_error(e.to_string()))?;
        let firestore = FirestoreClient::from_env()
            .await
            .map_err(|e| crate::error::WorkerError::config_error(e.to_string()))?;
        let analyzer =
            AnalyzerClient::new().map_err(|e| crate::error::WorkerError::config_error(e.to_string()))?;

        Ok(Self {
            config,
            gcs,
            jobs: JobRepository::new(firestore),
            analyzer,
        })
    }
}
