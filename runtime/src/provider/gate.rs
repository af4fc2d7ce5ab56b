//! Rate-limit gate for the generation service.
//!
//! A hard circuit breaker: once tripped, every call is refused until the
//! deadline passes. There is no half-open probing.

use super::generator::retry_hint;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff when the service gives no hint.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);
/// Slack added on top of a `retry in Ns` hint.
pub const HINT_PADDING: Duration = Duration::from_secs(5);

pub struct RateLimitGate {
    limited_until: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self {
            limited_until: Mutex::new(None),
        }
    }

    /// Time left before calls are allowed again, or `None` if open.
    pub fn remaining(&self) -> Option<Duration> {
        let until = (*self.limited_until.lock().unwrap_or_else(|e| e.into_inner()))?;
        let now = Instant::now();
        (now < until).then(|| until - now)
    }

    /// Refuse calls for `backoff` from now. Replaces any earlier deadline.
    pub fn trip(&self, backoff: Duration) {
        *self.limited_until.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now() + backoff);
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the backoff for a rate-limit error.
///
/// A `retry in Ns` hint in the message wins (rounded up, plus padding),
/// then a `Retry-After` header, then [`DEFAULT_BACKOFF`].
pub fn backoff_for(message: &str, retry_after: Option<Duration>) -> Duration {
    retry_hint(message)
        .map(|hint| hint + HINT_PADDING)
        .or(retry_after)
        .unwrap_or(DEFAULT_BACKOFF)
}
