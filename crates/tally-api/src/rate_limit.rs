use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::ApiError;
use crate::mask;

/// Fixed-window request limiter keyed by identifier.
///
/// Each identifier keeps the timestamps of its admitted requests inside the
/// trailing window; stale entries are pruned on every check. State is
/// in-memory only and resets on restart. The map mutex guards the
/// read-modify-write of a key's timestamp list against concurrent requests
/// for the same identifier.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `(allowed, retry_after_seconds)`. When rejected,
    /// `retry_after` is the time until the oldest in-window request ages
    /// out, floored at zero.
    pub fn is_allowed(&self, identifier: &str) -> (bool, f64) {
        self.check_at(identifier, Instant::now())
    }

    fn check_at(&self, identifier: &str, now: Instant) -> (bool, f64) {
        // A poisoned lock only means another thread panicked mid-check; the
        // map itself is still consistent.
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let entries = requests.entry(identifier.to_string()).or_default();
        entries.retain(|&t| now.duration_since(t) < self.window);

        if entries.len() >= self.max_requests {
            let oldest = entries[0];
            let retry_after =
                self.window.as_secs_f64() - now.duration_since(oldest).as_secs_f64();
            return (false, retry_after.max(0.0));
        }

        entries.push(now);
        (true, 0.0)
    }

    /// Rate-limit check as a fallible step: `Err(RateLimited)` carries the
    /// retry-after for the response.
    pub fn check(&self, identifier: &str) -> Result<(), ApiError> {
        let (allowed, retry_after) = self.is_allowed(identifier);
        if allowed {
            Ok(())
        } else {
            warn!(
                "Rate limit exceeded for {}",
                mask::hash_preview(identifier)
            );
            Err(ApiError::RateLimited { retry_after })
        }
    }

    /// Drop identifiers whose timestamp lists have pruned to empty, so the
    /// map does not grow with every identifier ever seen. Returns the
    /// number of evicted keys.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = requests.len();
        requests.retain(|_, entries| {
            entries.retain(|&t| now.duration_since(t) < self.window);
            !entries.is_empty()
        });
        before - requests.len()
    }
}
