//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "hoop_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "hoop_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "hoop_http_requests_in_flight";

    pub const UPLOAD_DURATION_SECONDS: &str = "hoop_upload_duration_seconds";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "hoop_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record upload duration.
pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .unwrap()
        .replace_all(path, ":id");
    let path = regex_lite::Regex::new(r"/jobs/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/jobs/:job_id");
    let path = regex_lite::Regex::new(r"/highlights/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/highlights/:job_id");
    let path = regex_lite::Regex::new(r"/shot-events/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/shot-events/:event_id");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_path_normalizes_job_and_highlight_ids() {
        assert_eq!(sanitize_path("/jobs/abc123-def456"), "/jobs/:job_id");
        assert_eq!(
            sanitize_path("/highlights/550e8400-e29b-41d4-a716-446655440000"),
            "/highlights/:job_id"
        );
        assert_eq!(
            sanitize_path("/jobs/abc/shot-events/ev1"),
            "/jobs/:job_id/shot-events/:event_id"
        );
    }
}
