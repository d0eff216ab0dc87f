//! Object store client (S3-compatible, serving `gs://bucket/key` URIs).
//!
//! Unlike a client bound to one bucket at construction, every operation takes
//! the bucket as an explicit argument, so a single client reaches both the
//! source and the output bucket.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the object store client.
#[derive(Debug, Clone)]
pub struct GcsConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl GcsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("GCS_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("GCS_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("GCS_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("GCS_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("GCS_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("GCS_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("GCS_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Bucket-agnostic object store client.
#[derive(Clone)]
pub struct GcsClient {
    client: Client,
}

impl GcsClient {
    /// Create a new client from configuration.
    pub async fn new(config: GcsConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "gcs",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = GcsConfig::from_env()?;
        Self::new(config).await
    }

    /// Upload a file from disk. Streams from a `ByteStream::from_path` rather
    /// than reading into memory.
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("uploading {} to gs://{}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("uploaded {} to gs://{}/{}", path.display(), bucket, key);
        Ok(())
    }

    /// Upload bytes directly.
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("uploading {} bytes to gs://{}/{}", data.len(), bucket, key);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Download an object to a file on disk.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("downloading gs://{}/{} to {}", bucket, key, path.display());

        let bytes = self.download_bytes(bucket, key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::DownloadFailed(format!("failed to create directory: {}", e))
            })?;
        }

        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("failed to write file: {}", e)))?;

        info!("downloaded gs://{}/{} to {}", bucket, key, path.display());
        Ok(())
    }

    /// Download an object's bytes into memory.
    pub async fn download_bytes(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    /// Delete a single object.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("deleting gs://{}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Check whether an object exists.
    pub async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }

    /// Generate a time-limited read URL for `gs://bucket/key`. TTL default is
    /// 15 minutes; callers may request other durations (30/60 min are the
    /// durations used by the download and stream-redirect endpoints).
    pub async fn sign_read(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        let presign_config =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Generate a time-limited presigned PUT URL so a client can upload
    /// `gs://bucket/key` directly, bypassing this service's own bandwidth.
    pub async fn sign_write(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> StorageResult<String> {
        let presign_config =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Check connectivity by heading a bucket.
    pub async fn check_connectivity(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("connectivity check failed: {}", e)))?;
        Ok(())
    }
}

/// Parse a `gs://bucket/key` URI into its bucket and key parts.
pub fn parse_uri(uri: &str) -> StorageResult<(String, String)> {
    let rest = uri
        .strip_prefix("gs://")
        .ok_or_else(|| StorageError::InvalidKey(format!("not a gs:// uri: {}", uri)))?;

    let (bucket, key) = rest
        .split_once('/')
        .ok_or_else(|| StorageError::InvalidKey(format!("missing key in uri: {}", uri)))?;

    if bucket.is_empty() || key.is_empty() {
        return Err(StorageError::InvalidKey(format!("empty bucket or key in uri: {}", uri)));
    }

    Ok((bucket.to_string(), key.to_string()))
}

/// Format a `gs://bucket/key` URI from its parts.
pub fn format_uri(bucket: &str, key: &str) -> String {
    format!("gs://{}/{}", bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uri_splits_bucket_and_key() {
        let (bucket, key) = parse_uri("gs://raw-videos/uploads/job-1/clip.mp4").unwrap();
        assert_eq!(bucket, "raw-videos");
        assert_eq!(key, "uploads/job-1/clip.mp4");
    }

    #[test]
    fn parse_uri_rejects_non_gs_scheme() {
        assert!(parse_uri("s3://bucket/key").is_err());
        assert!(parse_uri("bucket/key").is_err());
    }

    #[test]
    fn parse_uri_rejects_missing_key() {
        assert!(parse_uri("gs://bucket-only").is_err());
    }

    #[test]
    fn format_uri_round_trips_with_parse_uri() {
        let uri = format_uri("my-bucket", "a/b/c.mp4");
        assert_eq!(uri, "gs://my-bucket/a/b/c.mp4");
        let (bucket, key) = parse_uri(&uri).unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(key, "a/b/c.mp4");
    }
}
