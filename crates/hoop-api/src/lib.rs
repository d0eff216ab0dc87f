//! Axum HTTP API server for the highlight pipeline.
//!
//! Stateless request/response layer over the durable Job document store and
//! the Worker's Redis Streams queue: ingest video, publish jobs, and serve
//! the library of finished highlights. All heavy lifting (ffmpeg, the
//! analyzer, clip planning) happens in the Worker tier.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod ratelimit;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
