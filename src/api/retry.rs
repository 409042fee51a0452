//! Bounded retry with exponential backoff around a single remote call.
//!
//! Every attempt, retries included, takes a rate-limiter slot first.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{ApiError, RemoteError};
use crate::ratelimit::RateLimiter;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound of random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            jitter: Duration::from_millis(150),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`. `attempt` is 1-based.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_backoff);
        }

        let exponent = 2u32.saturating_pow(attempt.saturating_sub(1));
        let base = self.initial_backoff.saturating_mul(exponent).min(self.max_backoff);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Run `call` until it succeeds, fails permanently, or the attempt budget is spent.
///
/// Transient failures past the budget come back as
/// [`RemoteError::RetriesExhausted`]; anything else as [`RemoteError::Api`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: &RateLimiter,
    operation: &'static str,
    user_id: &str,
    mut call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        limiter.acquire().await;

        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(RemoteError::Api {
                operation,
                user_id: user_id.to_string(),
                source: err,
            });
        }
        if attempt >= attempts {
            return Err(RemoteError::RetriesExhausted {
                operation,
                user_id: user_id.to_string(),
                attempts,
                last: err,
            });
        }

        let delay = policy.delay_for(attempt, err.retry_after());
        warn!(
            operation,
            user_id,
            attempt,
            max_attempts = attempts,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "Transient API failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
