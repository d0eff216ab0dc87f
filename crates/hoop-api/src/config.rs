//! API configuration.

use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Request timeout applied to most handlers; `/upload` uses a longer one.
    pub request_timeout: Duration,
    /// Request timeout for the streaming multipart upload handler.
    pub upload_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Bucket that uploaded source video lands in.
    pub raw_bucket: String,
    /// Bucket the worker writes analysis/highlight/render output to.
    pub output_bucket: String,
    /// `/upload` rate limit, requests per window, per identity/IP.
    pub upload_rate_limit_per_minute: u32,
    /// Whether to expose `/metrics`.
    pub metrics_enabled: bool,
}

impl ApiConfig {
    /// Create config from environment variables. Fails fast: a deployment
    /// missing the bucket names would otherwise publish jobs the worker can
    /// never write output for.
    pub fn from_env() -> ApiResult<Self> {
        let raw_bucket = std::env::var("RAW_BUCKET_NAME")
            .map_err(|_| ApiError::config("RAW_BUCKET_NAME not set"))?;
        let output_bucket = std::env::var("OUTPUT_BUCKET_NAME")
            .map_err(|_| ApiError::config("OUTPUT_BUCKET_NAME not set"))?;

        Ok(Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            upload_timeout: Duration::from_secs(
                std::env::var("UPLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2 * 1024 * 1024 * 1024),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            raw_bucket,
            output_bucket,
            upload_rate_limit_per_minute: std::env::var("UPLOAD_RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(true),
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_raw_bucket_fails_fast() {
        std::env::remove_var("RAW_BUCKET_NAME");
        std::env::remove_var("OUTPUT_BUCKET_NAME");
        assert!(ApiConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn present_buckets_parse_successfully() {
        std::env::set_var("RAW_BUCKET_NAME", "hoop-raw");
        std::env::set_var("OUTPUT_BUCKET_NAME", "hoop-output");
        let config = ApiConfig::from_env().expect("config should parse");
        assert_eq!(config.raw_bucket, "hoop-raw");
        assert_eq!(config.output_bucket, "hoop-output");
        assert_eq!(config.upload_rate_limit_per_minute, 1);
        std::env::remove_var("RAW_BUCKET_NAME");
        std::env::remove_var("OUTPUT_BUCKET_NAME");
    }
}
