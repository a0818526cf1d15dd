//! Retry executor.

use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{BackoffState, RetryConfig, RetryPolicySettings};

/// Runs operations under bounded exponential backoff.
///
/// Clones share one configuration, so services built from the same executor
/// observe each other's [`configure`](Self::configure) calls.
///
/// The configuration is re-read on every failure rather than snapshotted per
/// call. A call that is already retrying while another task reconfigures the
/// executor may therefore mix old and new parameters.
///
/// ```
/// use azservice_retry::{RetryConfig, RetryExecutor};
///
/// # tokio_test::block_on(async {
/// let executor = RetryExecutor::new(RetryConfig::immediate(3));
/// let mut calls = 0;
///
/// let result: Result<u32, String> = executor
///     .run(|| {
///         calls += 1;
///         let n = calls;
///         async move { if n < 3 { Err(format!("attempt {}", n)) } else { Ok(n) } }
///     })
///     .await;
///
/// assert_eq!(result, Ok(3));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct RetryExecutor {
    config: Arc<RwLock<RetryConfig>>,
}

impl RetryExecutor {
    /// Create an executor with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Create an executor from bound retry policy settings.
    pub fn from_settings(settings: &RetryPolicySettings) -> Self {
        Self::new(settings.into())
    }

    /// Replace the active backoff parameters.
    pub fn configure(&self, max_retries: u32, base_delay: Duration, max_delay: Duration) {
        self.set_config(RetryConfig::new(max_retries, base_delay, max_delay));
    }

    /// Replace the active configuration wholesale.
    pub fn set_config(&self, config: RetryConfig) {
        debug!(
            max_retries = config.max_retries,
            base_delay_ms = config.base_delay.as_millis() as u64,
            max_delay_ms = config.max_delay.as_millis() as u64,
            "Retry policy configured"
        );
        *self.config.write() = config;
    }

    /// Current configuration.
    pub fn config(&self) -> RetryConfig {
        *self.config.read()
    }

    /// Run `operation`, retrying every failure until it succeeds or the
    /// retries are used up. The last failure is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Debug,
    {
        self.run_if(operation, |_| true).await
    }

    /// Like [`run`](Self::run), but a failure for which `should_retry`
    /// returns `false` is returned immediately.
    pub async fn run_if<T, E, F, Fut, P>(&self, mut operation: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: fmt::Debug,
    {
        let mut backoff = BackoffState::new();

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.after_failure(&mut backoff, &error, &should_retry) {
                Some(delay) if delay.is_zero() => {}
                Some(delay) => tokio::time::sleep(delay).await,
                None => return Err(error),
            }
        }
    }

    /// Blocking variant of [`run`](Self::run) for synchronous callers. Sleeps
    /// the current thread between attempts.
    pub fn run_blocking<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: fmt::Debug,
    {
        let mut backoff = BackoffState::new();

        loop {
            let error = match operation() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.after_failure(&mut backoff, &error, &|_: &E| true) {
                Some(delay) if delay.is_zero() => {}
                Some(delay) => std::thread::sleep(delay),
                None => return Err(error),
            }
        }
    }

    /// Like [`run`](Self::run), but abandoned as soon as `token` is
    /// cancelled, including while waiting out a backoff delay. Returns
    /// `None` when cancelled.
    pub async fn run_until_cancelled<T, E, F, Fut>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> Option<Result<T, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Debug,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Retry sequence cancelled");
                None
            }
            result = self.run(operation) => Some(result),
        }
    }

    // Delay before the next attempt, or `None` when the failure must be
    // handed back to the caller.
    fn after_failure<E, P>(
        &self,
        backoff: &mut BackoffState,
        error: &E,
        should_retry: &P,
    ) -> Option<Duration>
    where
        P: Fn(&E) -> bool,
        E: fmt::Debug,
    {
        if !should_retry(error) {
            debug!(error = ?error, "Failure is not retryable");
            return None;
        }

        let config = self.config();
        let Some(delay) = backoff.next_delay(&config) else {
            warn!(
                attempts = backoff.attempts() + 1,
                error = ?error,
                "Retries exhausted"
            );
            return None;
        };

        debug!(
            retry = backoff.attempts(),
            delay_ms = delay.as_millis() as u64,
            error = ?error,
            "Operation failed, retrying"
        );

        Some(delay)
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test]
    async fn test_always_failing_makes_n_plus_one_attempts() {
        for max_retries in 0..=5 {
            let executor = RetryExecutor::new(RetryConfig::immediate(max_retries));
            let calls = counter();

            let result: Result<(), String> = executor
                .run(|| {
                    let calls = calls.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        Err(format!("failure {}", n))
                    }
                })
                .await;

            assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
            assert_eq!(result.unwrap_err(), format!("failure {}", max_retries + 1));
        }
    }

    #[tokio::test]
    async fn test_unit_error_type() {
        let executor = RetryExecutor::new(RetryConfig::immediate(2));
        let calls = counter();

        let result: Result<u32, ()> = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    match calls.fetch_add(1, Ordering::SeqCst) {
                        0 | 1 => Err(()),
                        n => Ok(n),
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(
            executor.run_blocking(|| Err::<(), ()>(())),
            Err(())
        );
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let executor = RetryExecutor::new(RetryConfig::new(
            0,
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let calls = counter();
        let started = Instant::now();

        let result: Result<(), &str> = executor
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            })
            .await;

        assert_eq!(result, Err("nope"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let executor = RetryExecutor::default();
        let calls = counter();
        let started = Instant::now();

        let result: Result<&str, String> = executor
            .run(|| {
                let calls = calls.clone();
                async move {
                    match calls.fetch_add(1, Ordering::SeqCst) + 1 {
                        3 => Ok("third"),
                        n => Err(format!("attempt {} failed", n)),
                    }
                }
            })
            .await;

        let elapsed = started.elapsed();
        assert_eq!(result, Ok("third"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(elapsed >= Duration::from_millis(200), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(210), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_run_if_stops_on_non_retryable() {
        let executor = RetryExecutor::new(RetryConfig::immediate(5));
        let calls = counter();

        let result: Result<(), String> = executor
            .run_if(
                || {
                    let calls = calls.clone();
                    async move {
                        match calls.fetch_add(1, Ordering::SeqCst) {
                            0 => Err("transient".to_string()),
                            _ => Err("fatal".to_string()),
                        }
                    }
                },
                |error| error != "fatal",
            )
            .await;

        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_independent_calls_do_not_share_attempts() {
        let executor = RetryExecutor::new(RetryConfig::immediate(1));

        for _ in 0..3 {
            let calls = counter();
            let result: Result<u32, String> = executor
                .run(|| {
                    let calls = calls.clone();
                    async move {
                        match calls.fetch_add(1, Ordering::SeqCst) {
                            0 => Err("first".to_string()),
                            n => Ok(n),
                        }
                    }
                })
                .await;
            assert_eq!(result, Ok(1));
        }
    }

    #[tokio::test]
    async fn test_reconfiguration_applies_to_in_flight_call() {
        let executor = RetryExecutor::new(RetryConfig::immediate(10));
        let calls = counter();

        let result: Result<(), String> = executor
            .run(|| {
                let calls = calls.clone();
                let executor = executor.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        executor.configure(1, Duration::ZERO, Duration::ZERO);
                    }
                    Err("still failing".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(executor.config().max_retries, 1);
    }

    #[tokio::test]
    async fn test_clones_share_configuration() {
        let executor = RetryExecutor::default();
        let clone = executor.clone();

        clone.configure(7, Duration::from_millis(5), Duration::from_millis(50));
        assert_eq!(
            executor.config(),
            RetryConfig::new(7, Duration::from_millis(5), Duration::from_millis(50))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let executor = RetryExecutor::new(RetryConfig::new(
            5,
            Duration::from_secs(10),
            Duration::from_secs(10),
        ));
        let token = CancellationToken::new();
        let calls = counter();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result: Option<Result<(), String>> = executor
            .run_until_cancelled(&token, || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("unavailable".to_string())
                }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_future_cancels() {
        let executor = RetryExecutor::new(RetryConfig::new(
            5,
            Duration::from_secs(10),
            Duration::from_secs(10),
        ));
        let calls = counter();

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            executor.run(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("unavailable".to_string())
                }
            }),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completed_sequence_not_cancelled() {
        let executor = RetryExecutor::default();
        let token = CancellationToken::new();

        let result = executor
            .run_until_cancelled(&token, || async { Ok::<_, String>(42) })
            .await;

        assert_eq!(result, Some(Ok(42)));
    }

    #[test]
    fn test_run_blocking() {
        let executor = RetryExecutor::new(RetryConfig::new(
            3,
            Duration::from_millis(2),
            Duration::from_millis(4),
        ));
        let mut calls = 0;

        let result: Result<u32, String> = executor.run_blocking(|| {
            calls += 1;
            if calls < 3 {
                Err(format!("attempt {}", calls))
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_run_blocking_exhausted() {
        let executor = RetryExecutor::new(RetryConfig::immediate(2));
        let mut calls = 0;

        let result: Result<(), String> = executor.run_blocking(|| {
            calls += 1;
            Err(format!("attempt {}", calls))
        });

        assert_eq!(result, Err("attempt 3".to_string()));
    }
}
