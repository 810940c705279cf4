//! # Sliding-window rate limiter.
//!
//! Bounds how many sends pass the writer gate inside one window. The window
//! slides continuously: each `allow()` first evicts timestamps older than
//! the window, then admits the call only if room remains.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Sliding-window allowance over send timestamps.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            max_requests: cfg.max_requests,
            window: cfg.window,
            requests: Mutex::new(VecDeque::new()),
        }
    }

    /// Admits or rejects one request, recording it when admitted.
    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());

        while let Some(front) = requests.front() {
            if now.duration_since(*front) > self.window {
                requests.pop_front();
            } else {
                break;
            }
        }

        if requests.len() >= self.max_requests {
            return false;
        }
        requests.push_back(now);
        true
    }

    /// (in-window count, configured maximum).
    pub fn usage(&self) -> (usize, usize) {
        let requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        (requests.len(), self.max_requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize, window: Duration) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests: max,
            window,
        })
    }

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let limiter = limiter(3, Duration::from_secs(60));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
        assert_eq!(limiter.usage(), (3, 3));
    }

    #[test]
    fn window_expiry_frees_capacity() {
        let limiter = limiter(1, Duration::from_millis(10));
        assert!(limiter.allow());
        assert!(!limiter.allow());
        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.allow());
    }
}
