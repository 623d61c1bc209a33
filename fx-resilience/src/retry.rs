//! Retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use fx_types::FxError;
use tracing::warn;

/// Default number of total attempts.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Retries transient failures with doubling delays.
///
/// `max_attempts` counts every call, the first one included: with 3 attempts
/// and a 2s initial delay the operation runs at t=0, t=2s and t=6s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Delay slept before `attempt` (1-based): `initial_delay * 2^(attempt-2)`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        1u32.checked_shl(attempt - 2)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Runs `op` until it succeeds, fails non-transiently, or attempts run out.
    ///
    /// Non-transient errors are returned as-is without consuming a retry.
    /// Running out of attempts yields [`FxError::RetriesExhausted`].
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, FxError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FxError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) if attempt >= self.max_attempts => {
                    warn!(
                        attempts = attempt,
                        error = %err,
                        "giving up on upstream call"
                    );
                    return Err(FxError::RetriesExhausted {
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }
                Err(err) => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient upstream failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY)
    }
}
