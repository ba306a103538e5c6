//! Retry with exponential backoff for remote calls.

use crate::error::RemoteError;
use async_trait::async_trait;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Whether a failed call may succeed if repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Transient failure; try again after a backoff
    Retryable,
    /// Permanent failure; give up immediately
    Fatal,
}

/// Attempt budget and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each one after
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random delay added to each backoff
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Default backoff with a custom attempt budget.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Deterministic part of the wait before retry `retry` (0-indexed).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    fn delay(&self, retry: u32) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };
        self.backoff(retry) + jitter
    }
}

/// Source of backoff waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs a fallible async call until it succeeds, fails fatally, or runs
/// out of attempts.
#[derive(Debug, Clone)]
pub struct RetryExecutor<S = TokioSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl RetryExecutor<TokioSleeper> {
    /// Executor sleeping on the tokio timer.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, TokioSleeper)
    }
}

impl Default for RetryExecutor<TokioSleeper> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<S: Sleeper> RetryExecutor<S> {
    /// Executor that waits through `sleeper` between attempts.
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `op` until it succeeds.
    ///
    /// `classify` decides whether each failure is worth another attempt.
    /// `label` identifies the call in log output.
    pub async fn execute<T, E, F, Fut, C>(
        &self,
        label: &str,
        mut op: F,
        classify: C,
    ) -> Result<T, RemoteError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> Classification,
        E: Display,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempt += 1;

            if classify(&err) == Classification::Fatal {
                tracing::error!(call = label, attempt, "Non-retryable error: {}", err);
                return Err(RemoteError::Fatal(err));
            }

            if attempt >= max_attempts {
                tracing::error!(call = label, attempts = attempt, "Giving up: {}", err);
                return Err(RemoteError::RetriesExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.policy.delay(attempt - 1);
            tracing::warn!(
                call = label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis(),
                "Retryable error, backing off: {}",
                err
            );
            self.sleeper.sleep(delay).await;
        }
    }
}
