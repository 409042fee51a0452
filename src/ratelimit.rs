//! Outbound request pacing.
//!
//! Fixed-interval scheduler: every caller reserves the next free slot under a
//! lock, then sleeps until that slot outside the lock. Slots are exactly one
//! interval apart, so any half-open one-second window holds at most `rps` of them.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::config::MIN_RPS;

/// Process-wide request throttle. Share it behind an `Arc`.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `rps` acquisitions per second.
    pub fn new(rps: f64) -> Self {
        Self::with_interval(Duration::from_secs_f64(1.0 / rps.max(MIN_RPS)))
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until one more outbound call is allowed. Never fails.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        if slot > Instant::now() {
            trace!(wait_ms = (slot - Instant::now()).as_millis() as u64, "Throttling request");
            tokio::time::sleep_until(slot).await;
        }
    }
}
