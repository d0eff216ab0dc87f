//! Range extraction, concatenation, and mp4 conversion over a single source video.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Stream-copy a `[start, start+duration)` range out of `src` into `dst`.
///
/// Uses `-c copy` (no re-encode) with `-avoid_negative_ts make_zero` so the
/// cut clip's timestamps are rebased to zero, matching how the clips are
/// later fed to the concat demuxer.
pub async fn extract_range(
    src: impl AsRef<Path>,
    start_secs: f64,
    duration_secs: f64,
    dst: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(src.as_ref(), dst.as_ref())
        .seek(start_secs)
        .duration(duration_secs)
        .output_arg("-c")
        .output_arg("copy")
        .output_arg("-avoid_negative_ts")
        .output_arg("make_zero");

    FfmpegRunner::new().run(&cmd).await
}

/// Concatenate a sequence of same-codec clips, in order, into `dst`.
///
/// Writes a concat-demuxer file list to a temp file (released before the
/// subprocess opens it) and invokes `ffmpeg -f concat -safe 0`.
pub async fn concatenate(clip_paths: &[PathBuf], dst: impl AsRef<Path>) -> MediaResult<()> {
    if clip_paths.is_empty() {
        return Err(MediaError::InvalidVideo(
            "no clips to concatenate".to_string(),
        ));
    }

    let list_dir = tempfile::tempdir()?;
    let list_path = list_dir.path().join("concat_list.txt");
    let mut contents = String::new();
    for path in clip_paths {
        contents.push_str(&format!("file '{}'\n", path.display()));
    }
    fs::write(&list_path, contents).await?;

    let cmd = FfmpegCommand::new(&list_path, dst.as_ref())
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .output_arg("-c")
        .output_arg("copy");

    let result = FfmpegRunner::new().run(&cmd).await;
    drop(list_dir);
    result
}

/// Re-encode `src` to H.264/AAC mp4 with a fast-start atom, writing into `tmp_dir`.
///
/// Only needed when the source extension is not already `.mp4`. On failure
/// the caller should fall back to the original path rather than fail the job.
pub async fn convert_to_mp4(src: impl AsRef<Path>, tmp_dir: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let src = src.as_ref();
    let dst = tmp_dir.as_ref().join(format!(
        "{}.converted.mp4",
        src.file_stem().and_then(|s| s.to_str()).unwrap_or("video")
    ));

    let cmd = FfmpegCommand::new(src, &dst)
        .video_codec("libx264")
        .audio_codec("aac")
        .output_arg("-movflags")
        .output_arg("+faststart");

    match FfmpegRunner::new().run(&cmd).await {
        Ok(()) => Ok(dst),
        Err(e) => {
            warn!("mp4 conversion failed, falling back to original file: {e}");
            Ok(src.to_path_buf())
        }
    }
}

/// Convert `src` to mp4 only if its extension is not already `mp4`.
pub async fn ensure_mp4(src: impl AsRef<Path>, tmp_dir: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let src = src.as_ref();
    let is_mp4 = src
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("mp4"))
        .unwrap_or(false);

    if is_mp4 {
        Ok(src.to_path_buf())
    } else {
        convert_to_mp4(src, tmp_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concatenate_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = concatenate(&[], dir.path().join("out.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }
}
