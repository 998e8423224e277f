//! Per-client sliding-window rate limiting.
//!
//! Best-effort admission control guarding every entry point. The limiter
//! fails open: an internal fault must never block legitimate traffic.

use crate::error::{Result, ServiceError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Sliding window length.
const WINDOW: Duration = Duration::from_secs(60);
/// Key-count threshold above which empty keys are compacted away.
const COMPACTION_THRESHOLD: usize = 5_000;
/// Default capacity per key per window.
pub const DEFAULT_REQUESTS_PER_MINUTE: usize = 100;

/// Sliding 60-second window limiter keyed by client.
pub struct RateLimiter {
    requests_per_minute: usize,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter. The capacity must be positive.
    pub fn new(requests_per_minute: usize) -> Result<Self> {
        if requests_per_minute == 0 {
            return Err(ServiceError::Validation(
                "requests_per_minute must be positive".to_string(),
            ));
        }
        Ok(Self {
            requests_per_minute,
            requests: Mutex::new(HashMap::new()),
        })
    }

    /// Check whether a request from `client_key` is allowed right now,
    /// recording it if so.
    pub fn allow(&self, client_key: &str) -> bool {
        self.allow_at(client_key, Instant::now())
    }

    fn allow_at(&self, client_key: &str, now: Instant) -> bool {
        let key = if client_key.is_empty() {
            "unknown"
        } else {
            client_key
        };
        let window_start = now.checked_sub(WINDOW);

        let mut requests = self.requests.lock();

        // Drop timestamps that fell out of the window.
        let timestamps = requests.entry(key.to_string()).or_default();
        if let Some(window_start) = window_start {
            timestamps.retain(|&t| t > window_start);
        }

        let allowed = if timestamps.len() < self.requests_per_minute {
            timestamps.push(now);
            true
        } else {
            false
        };
        if !allowed {
            warn!(client = key, "rate limit exceeded");
        }

        // Bound memory: once enough keys accumulate, drop the empty ones.
        if requests.len() > COMPACTION_THRESHOLD {
            requests.retain(|_, timestamps| !timestamps.is_empty());
        }

        allowed
    }

    /// Number of currently tracked client keys.
    pub fn tracked_keys(&self) -> usize {
        self.requests.lock().len()
    }

    /// Clear all rate limiting data (useful for tests).
    pub fn reset(&self) {
        self.requests.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_capacity_must_be_positive() {
        assert!(RateLimiter::new(0).is_err());
        assert!(RateLimiter::new(1).is_ok());
    }

    #[test]
    fn test_admits_exactly_capacity_then_rejects() {
        let limiter = RateLimiter::new(3).unwrap();
        let now = Instant::now();
        assert!(limiter.allow_at("client", now));
        assert!(limiter.allow_at("client", now));
        assert!(limiter.allow_at("client", now));
        assert!(!limiter.allow_at("client", now));
    }

    #[test]
    fn test_window_rolls_forward() {
        let limiter = RateLimiter::new(2).unwrap();
        let start = Instant::now();
        assert!(limiter.allow_at("client", start));
        assert!(limiter.allow_at("client", start));
        assert!(!limiter.allow_at("client", start));

        // 61 seconds later the old timestamps are out of the window.
        let later = start + Duration::from_secs(61);
        assert!(limiter.allow_at("client", later));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1).unwrap();
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn test_empty_key_maps_to_unknown() {
        let limiter = RateLimiter::new(1).unwrap();
        let now = Instant::now();
        assert!(limiter.allow_at("", now));
        assert!(!limiter.allow_at("unknown", now));
    }

    #[test]
    fn test_reset() {
        let limiter = RateLimiter::new(1).unwrap();
        assert!(limiter.allow("client"));
        limiter.reset();
        assert_eq!(limiter.tracked_keys(), 0);
        assert!(limiter.allow("client"));
    }
}
