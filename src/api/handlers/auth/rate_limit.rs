//! Rate limiting primitives for throttled endpoints.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Five requests per minute, the throttle applied to submission endpoints.
pub const DEFAULT_LIMIT: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RateLimitAction {
    EmergencyCall,
    RecordSubmission,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter per (client key, action). Counts reset when the
/// window elapses; there is no sliding credit across windows.
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<(String, RateLimitAction), Window>>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, key: &str, action: RateLimitAction) -> RateLimitDecision {
        let Ok(mut windows) = self.windows.lock() else {
            // A poisoned lock means a panic elsewhere; fail open rather than
            // lock every client out.
            return RateLimitDecision::Allowed;
        };

        let now = Instant::now();
        windows.retain(|_, window| now.duration_since(window.started) < self.window);

        let window = windows
            .entry((key.to_string(), action))
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        if window.count >= self.limit {
            return RateLimitDecision::Limited;
        }
        window.count += 1;
        RateLimitDecision::Allowed
    }
}
