//! Shared data models for the basketball highlight pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - The Job document entity and its shot events
//! - Timestamp normalization shared by the analyzer and the API

pub mod job;
pub mod timestamp;

pub use job::{
    Job, JobId, JobStatus, PipelineMode, RawShotEvent, ShotEvent, ShotOutcome, Visibility,
};
pub use timestamp::RawTimestamp;
