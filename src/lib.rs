/// Resilience policies for outbound API calls
///
/// This library wraps opaque units of work with a composed pipeline of
/// production resilience patterns:
/// - **Circuit Breaker**: fails fast per operation once consecutive failures
///   reach a threshold, with a single recovery probe after the break
/// - **Retry**: exponential backoff with jitter for transient failures
/// - **Timeout**: bounds each individual attempt, cancelling overrunning work
/// - **Correlation tracking**: one correlation id threaded through every
///   attempt of a logical call and exposed to observability hooks
/// - **Pipeline cache**: one composed pipeline (and one circuit state) per
///   operation name and configuration
///
/// # Example: wrapping an API call
///
/// ```rust,no_run
/// use resilience_core::{presets, ResilienceExecutor};
///
/// #[tokio::main]
/// async fn main() {
///     let executor = ResilienceExecutor::new(presets::api_default());
///
///     let result = executor
///         .execute("GET /companies", || async {
///             // Your API call here
///             Ok::<_, String>(())
///         })
///         .await;
/// }
/// ```
///
/// # Example: cancellation and explicit correlation
///
/// ```rust,no_run
/// use resilience_core::{presets, ExecuteOptions, ResilienceExecutor};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let executor = ResilienceExecutor::new(presets::api_default());
///     let cancel = CancellationToken::new();
///
///     let options = ExecuteOptions {
///         correlation_id: Some("req-123".into()),
///         cancel: Some(cancel.clone()),
///     };
///     let result = executor
///         .execute_with("GET /projects", || async { Ok::<_, String>(()) }, options)
///         .await;
/// }
/// ```
pub mod backoff;
pub mod circuit_breaker;
pub mod context;
pub mod executor;
pub mod failure;
pub mod metrics;
pub mod observer;
pub mod presets;
pub mod retry;
pub mod timeout;

// Re-export main types for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use context::ExecutionContext;
pub use executor::{ExecuteOptions, PolicyConfig, ResilienceExecutor};
pub use failure::{ClassifyFailure, ConfigError, FailureClass, PolicyError};
pub use observer::{NoopObserver, PolicyObserver, TracingObserver};
pub use presets::{aggressive, api_default, long_running};
pub use retry::RetryConfig;
pub use timeout::TimeoutConfig;
