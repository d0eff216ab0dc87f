//! Health and readiness handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    pub detail: String,
}

/// `GET /` — a human-facing breadcrumb, not a monitored endpoint.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        detail: "hoop-api is running".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// `GET /healthz` — liveness probe. Always `ok:true` once the process is
/// serving requests; readiness of dependencies is `/ready`'s job.
pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self { status: "ok", error: None, latency_ms }
    }

    fn error(msg: impl Into<String>, latency_ms: u64) -> Self {
        Self { status: "error", error: Some(msg.into()), latency_ms }
    }
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub redis: CheckStatus,
    pub firestore: CheckStatus,
    pub storage: CheckStatus,
}

/// `GET /ready` — checks the queue, document store, and object store are
/// all reachable. 503 when any check fails.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let redis_check = {
        let start = Instant::now();
        match state.queue.len().await {
            Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string(), start.elapsed().as_millis() as u64),
        }
    };

    let firestore_check = firestore_health(&state).await;

    let storage_check = {
        let start = Instant::now();
        match state.gcs.check_connectivity(&state.config.output_bucket).await {
            Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string(), start.elapsed().as_millis() as u64),
        }
    };

    let all_ok = redis_check.status == "ok" && firestore_check.status == "ok" && storage_check.status == "ok";

    let response = ReadinessResponse {
        ready: all_ok,
        checks: ReadinessChecks {
            redis: redis_check,
            firestore: firestore_check,
            storage: storage_check,
        },
    };

    let status = if all_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(response))
}

async fn firestore_health(state: &AppState) -> CheckStatus {
    let start = Instant::now();
    // A lookup for a job that doesn't exist still proves the document store
    // is reachable and authenticated: `get` resolves a missing document to
    // `Ok(None)`, not an error.
    match state.jobs.get(&hoop_models::job::JobId::from_string("_health_check")).await {
        Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
        Err(e) => CheckStatus::error(e.to_string(), start.elapsed().as_millis() as u64),
    }
}
