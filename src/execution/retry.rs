use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::chain::ChainError;
use crate::errors::CycleError;

/// Bounded exponential backoff for transient chain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base · 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Outcome of a failed [`with_retry`] call.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ChainError },

    /// A non-transient error; no further attempts were made.
    #[error(transparent)]
    Fatal(ChainError),
}

impl RetryError {
    /// Convert into a cycle error, routing fatal errors through `on_fatal`.
    pub fn into_cycle_error(
        self,
        operation: &'static str,
        on_fatal: impl FnOnce(ChainError) -> CycleError,
    ) -> CycleError {
        match self {
            RetryError::Exhausted { attempts, last } => CycleError::NetworkExhausted {
                operation,
                attempts,
                source: last,
            },
            RetryError::Fatal(err) => on_fatal(err),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the retry
/// budget is spent.
pub async fn with_retry<T, F, Fut>(
    operation: &'static str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Fatal(e)),
            Err(e) if attempt > policy.max_retries => {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient chain error, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
