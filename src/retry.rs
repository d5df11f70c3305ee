/// Retry executor with exponential backoff and jitter
///
/// Drives one logical call: runs the initial attempt plus up to
/// `max_attempts` retries, each bounded by the timeout guard, sleeping the
/// computed backoff in between. Attempts are strictly sequential. The
/// caller's cancellation token is honored at every suspension point:
/// mid-attempt, mid-timeout wait and mid-backoff sleep.
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backoff;
use crate::context::ExecutionContext;
use crate::failure::{ClassifyFailure, ConfigError, FailureClass, PolicyError};
use crate::metrics::TimeoutMetrics;
use crate::observer::PolicyObserver;
use crate::timeout::{self, TimeoutConfig};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt; 0 disables retry entirely.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any computed delay, jitter excluded.
    pub max_delay: Duration,
    /// Growth factor per attempt when exponential backoff is on.
    pub backoff_multiplier: f64,
    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub max_jitter: Duration,
    pub use_exponential_backoff: bool,
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_jitter: Duration::from_millis(1000),
            use_exponential_backoff: true,
            use_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Range check for external configuration loaders.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts > 10 {
            return Err(ConfigError::new(
                "retry.max_attempts",
                format!("{} outside 0..=10", self.max_attempts),
            ));
        }
        if self.base_delay < Duration::from_millis(100) || self.base_delay > Duration::from_secs(60)
        {
            return Err(ConfigError::new(
                "retry.base_delay",
                format!("{:?} outside 100ms..=60s", self.base_delay),
            ));
        }
        if self.max_delay < Duration::from_secs(1) || self.max_delay > Duration::from_secs(300) {
            return Err(ConfigError::new(
                "retry.max_delay",
                format!("{:?} outside 1s..=300s", self.max_delay),
            ));
        }
        if !(1.0..=5.0).contains(&self.backoff_multiplier) {
            return Err(ConfigError::new(
                "retry.backoff_multiplier",
                format!("{} outside 1.0..=5.0", self.backoff_multiplier),
            ));
        }
        if self.max_jitter > Duration::from_secs(10) {
            return Err(ConfigError::new(
                "retry.max_jitter",
                format!("{:?} above 10s", self.max_jitter),
            ));
        }
        Ok(())
    }
}

/// Runs the attempt loop for one call. Timeouts count as retryable attempts;
/// permanent failures and cancellation end the loop immediately.
pub(crate) async fn run<W, Fut, T, E>(
    retry: &RetryConfig,
    timeout_cfg: &TimeoutConfig,
    observer: &dyn PolicyObserver,
    ctx: &mut ExecutionContext,
    cancel: &CancellationToken,
    mut work: W,
) -> Result<T, PolicyError<E>>
where
    W: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ClassifyFailure + Display,
{
    loop {
        if cancel.is_cancelled() {
            return Err(PolicyError::Cancelled);
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(PolicyError::Cancelled),
            outcome = timeout::bound_attempt(timeout_cfg, work()) => outcome,
        };

        let descriptor = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(failure)) => {
                let descriptor = failure.to_string();
                ctx.record_failure(descriptor.clone());
                match failure.classify() {
                    FailureClass::Permanent => return Err(PolicyError::Rejected(failure)),
                    FailureClass::Transient => {
                        if ctx.attempt() >= retry.max_attempts {
                            return Err(PolicyError::Exhausted {
                                attempts: ctx.attempt() + 1,
                                last: failure,
                            });
                        }
                        descriptor
                    }
                }
            }
            Err(timed_out) => {
                let descriptor = timed_out.to_string();
                ctx.record_failure(descriptor.clone());
                observer.on_timeout(ctx, timed_out.limit);
                TimeoutMetrics::record("timeout");
                if ctx.attempt() >= retry.max_attempts {
                    return Err(PolicyError::Timeout {
                        limit: timed_out.limit,
                    });
                }
                descriptor
            }
        };

        ctx.next_attempt();
        let delay = backoff::compute_delay(retry, ctx.attempt());
        observer.on_retry(ctx, delay, &descriptor);

        tokio::select! {
            _ = cancel.cancelled() => return Err(PolicyError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_jitter: Duration::ZERO,
            use_exponential_backoff: true,
            use_jitter: false,
        }
    }

    fn unbounded() -> TimeoutConfig {
        TimeoutConfig {
            per_attempt: Duration::from_secs(30),
            enabled: false,
        }
    }

    async fn drive<W, Fut, T, E>(
        retry: RetryConfig,
        work: W,
    ) -> (Result<T, PolicyError<E>>, ExecutionContext)
    where
        W: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure + Display,
    {
        let mut ctx = ExecutionContext::new("test-op", None);
        let cancel = CancellationToken::new();
        let result = run(
            &retry,
            &unbounded(),
            &NoopObserver,
            &mut ctx,
            &cancel,
            work,
        )
        .await;
        (result, ctx)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let (result, ctx) = drive(fast_retry(3), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.attempt(), 0);
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let (result, ctx) = drive(fast_retry(3), move || {
            let count = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.attempt(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_attempts_exactly_max_plus_one() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let (result, _) = drive(fast_retry(2), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>("persistent".to_string()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(PolicyError::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_max_attempts_disables_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let (result, _) = drive(fast_retry(0), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>("failure".to_string()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(PolicyError::Exhausted { attempts: 1, .. })
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_retry() {
        #[derive(Debug)]
        struct BadRequest;
        impl Display for BadRequest {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "400 bad request")
            }
        }
        impl ClassifyFailure for BadRequest {
            fn classify(&self) -> FailureClass {
                FailureClass::Permanent
            }
        }

        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let (result, _) = drive(fast_retry(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>(BadRequest) }
        })
        .await;

        assert!(matches!(result, Err(PolicyError::Rejected(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retryable_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let timeout_cfg = TimeoutConfig {
            per_attempt: Duration::from_millis(10),
            enabled: true,
        };

        let mut ctx = ExecutionContext::new("test-op", None);
        let cancel = CancellationToken::new();
        let result: Result<i32, PolicyError<String>> = run(
            &fast_retry(1),
            &timeout_cfg,
            &NoopObserver,
            &mut ctx,
            &cancel,
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(1)
                }
            },
        )
        .await;

        // Initial attempt + 1 retry, both timed out.
        assert!(matches!(result, Err(PolicyError::Timeout { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_during_backoff_is_terminal() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let cancel = CancellationToken::new();
        let cancel_handle = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancel_handle.cancel();
        });

        let retry = RetryConfig {
            base_delay: Duration::from_secs(60),
            ..fast_retry(5)
        };
        let mut ctx = ExecutionContext::new("test-op", None);
        let result: Result<i32, PolicyError<String>> = run(
            &retry,
            &unbounded(),
            &NoopObserver,
            &mut ctx,
            &cancel,
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err("transient".to_string()) }
            },
        )
        .await;

        assert!(matches!(result, Err(PolicyError::Cancelled)));
        // One attempt, then cancelled mid-backoff with budget remaining.
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(RetryConfig::default().validate().is_ok());

        let bad = RetryConfig {
            max_attempts: 11,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = RetryConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = RetryConfig {
            base_delay: Duration::from_millis(10),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
