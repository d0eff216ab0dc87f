#![deny(unreachable_patterns)]
//! Video processing worker.
//!
//! This crate provides the Subscriber side of the job queue: consuming
//! envelopes, running each through the analysis/render pipeline, and
//! persisting the resulting Job state with graceful shutdown support.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod logging;
pub mod pipeline;

pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
