#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for video processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio
//! - Probe, extract-range, concatenate, and mp4-conversion operations

pub mod clip;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;

pub use clip::{concatenate, convert_to_mp4, ensure_mp4, extract_range};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{get_duration, get_duration_secs_ceil, probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
