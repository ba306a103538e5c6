//! Minimum spacing between remote calls, per call class.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A named group of calls sharing one rate budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallClass {
    name: &'static str,
    min_interval: Duration,
}

impl CallClass {
    /// Listing and message-detail calls, 5 per second.
    pub const SEARCH: Self = Self::new("search", Duration::from_millis(200));

    /// Attachment downloads, 3 per second.
    pub const DOWNLOAD: Self = Self::new("download", Duration::from_millis(334));

    /// A class with an explicit minimum interval.
    #[must_use]
    pub const fn new(name: &'static str, min_interval: Duration) -> Self {
        Self { name, min_interval }
    }

    /// A class allowing at most `calls_per_second` calls.
    /// Non-positive rates disable spacing.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn per_second(name: &'static str, calls_per_second: f64) -> Self {
        let min_interval = if calls_per_second > 0.0 {
            Duration::from_millis((1000.0 / calls_per_second).ceil() as u64)
        } else {
            Duration::ZERO
        };
        Self::new(name, min_interval)
    }

    /// Class name used as the limiter key.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Minimum time between the end of one call and the start of the next.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

/// Tracks when each call class last completed.
///
/// Classes are independent; there is no queue, so concurrent callers of
/// one class are not ordered.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_call: Mutex<HashMap<&'static str, Instant>>,
}

impl RateLimiter {
    /// Limiter with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `class` may be called again.
    pub async fn acquire(&self, class: CallClass) {
        let wait = self
            .last_call()
            .get(class.name)
            .and_then(|last| (*last + class.min_interval).checked_duration_since(Instant::now()))
            .filter(|wait| !wait.is_zero());

        if let Some(wait) = wait {
            tracing::debug!(class = class.name, wait_ms = wait.as_millis(), "Rate limiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Stamp `class` as called now.
    pub fn record(&self, class: CallClass) {
        self.last_call().insert(class.name, Instant::now());
    }

    /// Run `op` inside the budget of `class`, stamping on completion.
    pub async fn throttle<T, F, Fut>(&self, class: CallClass, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(class).await;
        let out = op().await;
        self.record(class);
        out
    }

    fn last_call(&self) -> MutexGuard<'_, HashMap<&'static str, Instant>> {
        self.last_call.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_waited(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "waited {elapsed:?}, expected {expected:?}"
        );
    }

    #[test]
    fn test_per_second_intervals() {
        assert_eq!(
            CallClass::per_second("search", 5.0).min_interval(),
            Duration::from_millis(200)
        );
        assert_eq!(
            CallClass::per_second("download", 3.0).min_interval(),
            CallClass::DOWNLOAD.min_interval()
        );
        assert_eq!(CallClass::per_second("x", 0.0).min_interval(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_does_not_wait() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.acquire(CallClass::SEARCH).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_remaining_interval() {
        let limiter = RateLimiter::new();
        limiter.record(CallClass::SEARCH);

        tokio::time::advance(Duration::from_millis(50)).await;
        let start = Instant::now();
        limiter.acquire(CallClass::SEARCH).await;
        assert_waited(start, Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval() {
        let limiter = RateLimiter::new();
        limiter.record(CallClass::DOWNLOAD);

        tokio::time::advance(Duration::from_millis(400)).await;
        let start = Instant::now();
        limiter.acquire(CallClass::DOWNLOAD).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classes_are_independent() {
        let limiter = RateLimiter::new();
        limiter.record(CallClass::SEARCH);

        let start = Instant::now();
        limiter.acquire(CallClass::DOWNLOAD).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_spaces_consecutive_calls() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.throttle(CallClass::SEARCH, || async {}).await;
        }
        // first call free, then two 200ms gaps
        assert_waited(start, Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_stamps_completion() {
        let limiter = RateLimiter::new();
        limiter
            .throttle(CallClass::SEARCH, || {
                tokio::time::sleep(Duration::from_millis(500))
            })
            .await;

        // interval counts from when the slow call finished
        let start = Instant::now();
        limiter.acquire(CallClass::SEARCH).await;
        assert_waited(start, Duration::from_millis(200));
    }
}
