//! Signed-URL delivery for source and rendered video.
//!
//! Every read-side URL the API hands out is a time-limited presigned GET
//! against the object store; there is no server-side revocation short of the
//! TTL expiring.

use std::time::Duration;

use crate::client::GcsClient;
use crate::error::StorageResult;

/// Default TTL for a download link.
pub const DOWNLOAD_TTL: Duration = Duration::from_secs(30 * 60);
/// Default TTL for a stream-redirect link.
pub const STREAM_TTL: Duration = Duration::from_secs(60 * 60);
/// Default TTL when no endpoint-specific override applies.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);
/// TTL for a direct-to-bucket upload URL handed out by the two-phase upload flow.
pub const UPLOAD_TTL: Duration = Duration::from_secs(15 * 60);

/// Sign a read URL for `gs://bucket/key` with the given TTL, expressed in
/// whole minutes as the API surface reports it.
pub async fn sign_read_url(
    client: &GcsClient,
    bucket: &str,
    key: &str,
    ttl: Duration,
) -> StorageResult<(String, u32)> {
    let url = client.sign_read(bucket, key, ttl).await?;
    let minutes = (ttl.as_secs() / 60) as u32;
    Ok((url, minutes))
}

/// Sign a write (PUT) URL for `gs://bucket/key` with the given TTL.
pub async fn sign_write_url(
    client: &GcsClient,
    bucket: &str,
    key: &str,
    content_type: &str,
    ttl: Duration,
) -> StorageResult<(String, u32)> {
    let url = client.sign_write(bucket, key, content_type, ttl).await?;
    let minutes = (ttl.as_secs() / 60) as u32;
    Ok((url, minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_constants_are_expressed_in_whole_minutes() {
        assert_eq!(DOWNLOAD_TTL.as_secs() / 60, 30);
        assert_eq!(STREAM_TTL.as_secs() / 60, 60);
        assert_eq!(DEFAULT_TTL.as_secs() / 60, 15);
        assert_eq!(UPLOAD_TTL.as_secs() / 60, 15);
    }
}
