//! Per-destination throttle for OTP sends.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use invoicer_shared::clients::redis::RedisClient;
use invoicer_shared::errors::AppError;

#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// True if another hit for `key` is allowed right now. Counts the hit.
    async fn check(&self, key: &str) -> Result<bool, AppError>;

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Fixed window counter in Redis. Keys are hashed so raw destinations never
/// reach the cache.
pub struct RedisRateLimiter {
    redis: RedisClient,
    limit: u64,
    window_secs: u64,
}

impl RedisRateLimiter {
    pub fn new(redis: RedisClient, limit: u64, window_secs: u64) -> Self {
        Self {
            redis,
            limit,
            window_secs,
        }
    }
}

pub fn limiter_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("otp:send:{}", hex::encode(digest))
}

#[async_trait::async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<bool, AppError> {
        let hits = self
            .redis
            .window_hit(&limiter_key(key), self.window_secs)
            .await
            .map_err(|e| AppError::internal(format!("rate limiter: {e}")))?;
        Ok(hits <= self.limit)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.redis
            .ping()
            .await
            .map_err(|e| AppError::internal(format!("rate limiter: {e}")))
    }
}

/// Same window semantics as [`RedisRateLimiter`], held in process memory.
pub struct MemoryRateLimiter {
    limit: u64,
    window: Duration,
    hits: Mutex<HashMap<String, (DateTime<Utc>, u64)>>,
}

impl MemoryRateLimiter {
    pub fn new(limit: u64, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::seconds(window_secs as i64),
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        let window = self.window;
        hits.retain(|_, (start, _)| now < *start + window);

        let (_, count) = hits.entry(key.to_string()).or_insert((now, 0));
        *count += 1;
        *count <= self.limit
    }
}

#[async_trait::async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.check_at(key, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_limit_hits_per_window() {
        let limiter = MemoryRateLimiter::new(1, 60);
        let now = Utc::now();

        assert!(limiter.check_at("a@example.com", now));
        assert!(!limiter.check_at("a@example.com", now + Duration::seconds(30)));
        assert!(limiter.check_at("b@example.com", now + Duration::seconds(30)));
        assert!(limiter.check_at("a@example.com", now + Duration::seconds(61)));
    }

    #[test]
    fn redis_keys_do_not_leak_destination() {
        let key = limiter_key("a@example.com");
        assert!(key.starts_with("otp:send:"));
        assert!(!key.contains("example"));
        assert_eq!(key.len(), "otp:send:".len() + 64);
    }
}
