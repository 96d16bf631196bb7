//! Rate Limiter (C6, §4.6): per (tenant, server) sliding 60-second window.
//!
//! `tryAcquire` is synchronous and does no I/O, so the bucket is guarded by a
//! plain `std::sync::Mutex` rather than a `tokio::sync::Mutex` — it is never
//! held across an `.await` point, per this workspace's hybrid-mutex rule.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// A ring of recent request timestamps within the last 60 seconds (§3).
#[derive(Debug)]
pub struct RateLimiterBucket {
    limit: usize,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiterBucket {
    #[must_use]
    pub fn new(requests_per_minute: usize) -> Self {
        Self {
            limit: requests_per_minute,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Prune stale entries; if `len < limit`, append `now` and allow; else
    /// deny. O(n) pruning where n ≤ limit.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Same as `try_acquire` but takes an explicit clock reading, so tests
    /// can exercise window-boundary behavior without a real sleep.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut timestamps = self.timestamps.lock().expect("rate limiter mutex poisoned");
        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) > WINDOW {
                timestamps.pop_front();
            } else {
                break;
            }
        }
        if timestamps.len() < self.limit {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nth_plus_one_call_within_window_is_denied() {
        let bucket = RateLimiterBucket::new(2);
        let t0 = Instant::now();
        assert!(bucket.try_acquire_at(t0));
        assert!(bucket.try_acquire_at(t0));
        assert!(!bucket.try_acquire_at(t0));
    }

    #[test]
    fn call_past_the_window_succeeds_again() {
        let bucket = RateLimiterBucket::new(1);
        let t0 = Instant::now();
        assert!(bucket.try_acquire_at(t0));
        assert!(!bucket.try_acquire_at(t0 + Duration::from_secs(30)));
        assert!(bucket.try_acquire_at(t0 + Duration::from_secs(61)));
    }
}
