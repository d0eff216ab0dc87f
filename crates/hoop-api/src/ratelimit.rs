//! Shared rate limiting for `/upload`.
//!
//! The teacher's `middleware::RateLimiterCache` keeps a `governor` limiter
//! per client IP in process memory, which only limits one API replica at a
//! time. A fixed-window counter in Redis (the same store the queue already
//! depends on) is shared across every replica instead.

use std::time::Duration;

use redis::AsyncCommands;

use crate::error::{ApiError, ApiResult};

const WINDOW_SECS: u64 = 60;

/// Redis-backed fixed-window limiter keyed by caller identity.
#[derive(Clone)]
pub struct RateLimiter {
    client: redis::Client,
    limit: u32,
}

impl RateLimiter {
    pub fn new(redis_url: &str, limit: u32) -> ApiResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ApiError::internal(format!("opening rate limiter redis client: {e}")))?;
        Ok(Self { client, limit })
    }

    /// Increment `key`'s counter for the current window and report whether
    /// the caller is still within the limit. Fails open (allows the request)
    /// on a Redis error: a down rate limiter must not take `/upload` with it.
    pub async fn check(&self, key: &str) -> bool {
        match self.check_inner(key).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(error = %e, "rate limiter unavailable, allowing request");
                true
            }
        }
    }

    async fn check_inner(&self, key: &str) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let redis_key = format!("hoop:ratelimit:{key}");

        let count: u64 = conn.incr(&redis_key, 1).await?;
        if count == 1 {
            conn.expire::<_, ()>(&redis_key, WINDOW_SECS as i64).await?;
        }

        Ok(count <= self.limit as u64)
    }
}

/// Identity used as the limiter key: authenticated identity when present,
/// otherwise the caller's remote IP.
pub fn rate_limit_key(user_id: Option<&str>, owner_email: Option<&str>, remote_ip: &str) -> String {
    match owner_email.or(user_id) {
        Some(identity) => format!("user:{identity}"),
        None => format!("ip:{remote_ip}"),
    }
}

/// Window duration, exposed for tests and for documenting the `Retry-After` behavior.
pub fn window() -> Duration {
    Duration::from_secs(WINDOW_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefers_owner_email_over_user_id() {
        let key = rate_limit_key(Some("u1"), Some("a@x.com"), "1.2.3.4");
        assert_eq!(key, "user:a@x.com");
    }

    #[test]
    fn key_falls_back_to_remote_ip() {
        let key = rate_limit_key(None, None, "1.2.3.4");
        assert_eq!(key, "ip:1.2.3.4");
    }

    #[test]
    fn window_is_one_minute() {
        assert_eq!(window().as_secs(), 60);
    }
}
