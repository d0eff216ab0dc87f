//! Object store adapter for the highlight pipeline (uploaded source video and
//! rendered output), generalized across both buckets per call.
//!
//! This crate provides:
//! - Stream upload/download against a bucket-agnostic client
//! - `gs://bucket/key` URI parsing and formatting
//! - Time-limited signed read URLs

pub mod client;
pub mod delivery;
pub mod error;

pub use client::{format_uri, parse_uri, GcsClient, GcsConfig};
pub use delivery::{sign_read_url, sign_write_url, DEFAULT_TTL, DOWNLOAD_TTL, STREAM_TTL, UPLOAD_TTL};
pub use error::{StorageError, StorageResult};
