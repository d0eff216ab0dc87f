//! API routes.

use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::engagement::{record_like, record_view};
use crate::handlers::health::{healthz, ready, root};
use crate::handlers::highlights::{delete_highlight, list_highlights, update_highlight};
use crate::handlers::jobs::{create_shot_event, delete_shot_event, download, get_job, highlight_data, update_shot_event};
use crate::handlers::stream::stream;
use crate::handlers::unsubscribe::unsubscribe;
use crate::handlers::upload::{publish_job, publish_render_job, upload, upload_complete, upload_init};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers, upload_rate_limit_middleware};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_routes = Router::new()
        .route("/upload", post(upload))
        .route("/upload/init", post(upload_init))
        .route("/upload/complete", post(upload_complete))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            upload_rate_limit_middleware,
        ));

    let publish_routes = Router::new()
        .route("/publish_job", post(publish_job))
        .route("/publish_render_job", post(publish_render_job));

    let job_routes = Router::new()
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/download", get(download))
        .route("/jobs/:job_id/highlight-data", get(highlight_data))
        .route("/jobs/:job_id/shot-events", post(create_shot_event))
        .route("/jobs/:job_id/shot-events/:event_id", patch(update_shot_event))
        .route("/jobs/:job_id/shot-events/:event_id", delete(delete_shot_event));

    let highlight_routes = Router::new()
        .route("/highlights", get(list_highlights))
        .route("/highlights/:job_id", patch(update_highlight))
        .route("/highlights/:job_id", delete(delete_highlight));

    let engagement_routes = Router::new()
        .route("/video/engagement/view", post(record_view))
        .route("/video/engagement/like", post(record_like));

    let misc_routes = Router::new()
        .route("/stream/:job_id", get(stream))
        .route("/unsubscribe", post(unsubscribe));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(upload_routes)
        .merge(publish_routes)
        .merge(job_routes)
        .merge(highlight_routes)
        .merge(engagement_routes)
        .merge(misc_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
