/// Policy composition and the single execution entry point
///
/// For each operation name the executor builds, caches and reuses one
/// composite pipeline: circuit breaker around retry around per-attempt
/// timeout. The ordering is deliberate: the timeout bounds each individual
/// attempt, the retry executor sees and counts every per-attempt outcome
/// (timeouts included), and the circuit breaker observes only the aggregate
/// outcome of the full retry sequence, so transient retried failures do not
/// trip it while persistent ones do.
use std::collections::hash_map::DefaultHasher;
use std::fmt::Display;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::context::ExecutionContext;
use crate::failure::{ClassifyFailure, ConfigError, PolicyError};
use crate::metrics::RetryMetrics;
use crate::observer::{PolicyObserver, TracingObserver};
use crate::retry::{self, RetryConfig};
use crate::timeout::TimeoutConfig;

/// Immutable bundle of retry, circuit-breaker and timeout settings.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub timeout: TimeoutConfig,
}

impl PolicyConfig {
    /// Range check for external configuration loaders; the execution path
    /// never validates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.timeout.validate()
    }

    /// Stable digest of every field. Part of the cache key, so a different
    /// configuration yields a different pipeline instead of silently reusing
    /// a stale one.
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.retry.max_attempts.hash(&mut hasher);
        self.retry.base_delay.hash(&mut hasher);
        self.retry.max_delay.hash(&mut hasher);
        self.retry.backoff_multiplier.to_bits().hash(&mut hasher);
        self.retry.max_jitter.hash(&mut hasher);
        self.retry.use_exponential_backoff.hash(&mut hasher);
        self.retry.use_jitter.hash(&mut hasher);
        self.circuit_breaker.failure_threshold.hash(&mut hasher);
        self.circuit_breaker.break_duration.hash(&mut hasher);
        self.circuit_breaker.enabled.hash(&mut hasher);
        self.timeout.per_attempt.hash(&mut hasher);
        self.timeout.enabled.hash(&mut hasher);
        hasher.finish()
    }
}

/// Per-call options for [`ResilienceExecutor::execute_with`].
#[derive(Debug, Default, Clone)]
pub struct ExecuteOptions {
    /// Correlation id to thread through the call; generated when absent.
    pub correlation_id: Option<String>,
    /// External cancellation signal, honored at every suspension point.
    pub cancel: Option<CancellationToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PolicyKey {
    operation: String,
    fingerprint: u64,
}

/// One cached composite pipeline: the breaker owns the operation's shared
/// state, the configs drive the per-call layers.
pub(crate) struct OperationPolicy {
    pub(crate) breaker: CircuitBreaker,
    pub(crate) retry: RetryConfig,
    pub(crate) timeout: TimeoutConfig,
}

/// The engine's sole entry point: wraps opaque units of work with the
/// composed resilience pipeline, keyed and cached per operation name.
pub struct ResilienceExecutor {
    config: PolicyConfig,
    observer: Arc<dyn PolicyObserver>,
    policies: DashMap<PolicyKey, Arc<OperationPolicy>>,
}

impl ResilienceExecutor {
    /// Executor with the given defaults, logging transitions through
    /// [`TracingObserver`].
    pub fn new(config: PolicyConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Executor with a caller-supplied observer.
    pub fn with_observer(config: PolicyConfig, observer: Arc<dyn PolicyObserver>) -> Self {
        Self {
            config,
            observer,
            policies: DashMap::new(),
        }
    }

    /// Executes `work` under the composite policy for `operation`, using the
    /// executor's default configuration. `work` is re-invoked once per
    /// attempt and must return a success value or a classified failure.
    pub async fn execute<W, Fut, T, E>(
        &self,
        operation: &str,
        work: W,
    ) -> Result<T, PolicyError<E>>
    where
        W: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure + Display,
    {
        self.run(operation, &self.config, work, ExecuteOptions::default())
            .await
    }

    /// [`execute`](Self::execute) with a caller-supplied correlation id
    /// and/or cancellation token.
    pub async fn execute_with<W, Fut, T, E>(
        &self,
        operation: &str,
        work: W,
        options: ExecuteOptions,
    ) -> Result<T, PolicyError<E>>
    where
        W: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure + Display,
    {
        self.run(operation, &self.config, work, options).await
    }

    /// [`execute`](Self::execute) with a per-operation configuration (for
    /// instance a long-running preset for bulk endpoints). A configuration
    /// change produces a distinct cache entry; the default-config pipeline
    /// for the same operation is untouched.
    pub async fn execute_with_config<W, Fut, T, E>(
        &self,
        operation: &str,
        config: &PolicyConfig,
        work: W,
        options: ExecuteOptions,
    ) -> Result<T, PolicyError<E>>
    where
        W: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure + Display,
    {
        self.run(operation, config, work, options).await
    }

    async fn run<W, Fut, T, E>(
        &self,
        operation: &str,
        config: &PolicyConfig,
        work: W,
        options: ExecuteOptions,
    ) -> Result<T, PolicyError<E>>
    where
        W: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure + Display,
    {
        let policy = self.policy_for(operation, config);
        let mut ctx = ExecutionContext::new(operation, options.correlation_id);
        let cancel = options.cancel.unwrap_or_default();

        let permit = match policy.breaker.admit() {
            Ok(permit) => permit,
            Err(retry_after) => {
                return Err(PolicyError::CircuitOpen {
                    operation: operation.to_string(),
                    retry_after,
                })
            }
        };

        let result = retry::run(
            &policy.retry,
            &policy.timeout,
            self.observer.as_ref(),
            &mut ctx,
            &cancel,
            work,
        )
        .await;

        match &result {
            Ok(_) => {
                permit.success();
                RetryMetrics::record_attempts("success", ctx.attempt() + 1);
            }
            // Cancellation is the caller's doing, not the service's: release
            // the admission without a verdict.
            Err(PolicyError::Cancelled) => permit.abandon(),
            Err(failure) => {
                permit.failure(&failure.to_string());
                RetryMetrics::record_attempts("failure", ctx.attempt() + 1);
            }
        }

        result
    }

    /// Looks up or builds the composite pipeline for this operation and
    /// configuration. For a fixed configuration the same operation always
    /// yields the same pipeline, so its circuit state is shared by every
    /// concurrent caller; construction happens at most once per key.
    pub(crate) fn policy_for(&self, operation: &str, config: &PolicyConfig) -> Arc<OperationPolicy> {
        let key = PolicyKey {
            operation: operation.to_string(),
            fingerprint: config.fingerprint(),
        };

        if let Some(policy) = self.policies.get(&key) {
            return Arc::clone(&policy);
        }

        Arc::clone(
            &self
                .policies
                .entry(key)
                .or_insert_with(|| {
                    Arc::new(OperationPolicy {
                        breaker: CircuitBreaker::new(
                            operation,
                            config.circuit_breaker.clone(),
                            Arc::clone(&self.observer),
                        ),
                        retry: config.retry.clone(),
                        timeout: config.timeout.clone(),
                    })
                })
                .value(),
        )
    }

    /// Circuit state for an operation under the default configuration, if a
    /// pipeline exists for it.
    pub fn circuit_state(&self, operation: &str) -> Option<CircuitState> {
        let key = PolicyKey {
            operation: operation.to_string(),
            fingerprint: self.config.fingerprint(),
        };
        self.policies.get(&key).map(|p| p.breaker.state())
    }

    /// Forces the circuit Closed for every cached pipeline of an operation.
    pub fn reset_circuit(&self, operation: &str) {
        for entry in self.policies.iter() {
            if entry.key().operation == operation {
                entry.value().breaker.reset();
            }
        }
    }

    /// Drops every cached pipeline for an operation. The next call rebuilds
    /// from scratch with fresh circuit state.
    pub fn invalidate(&self, operation: &str) {
        self.policies.retain(|key, _| key.operation != operation);
    }
}
