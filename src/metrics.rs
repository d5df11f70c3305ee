/// Prometheus metrics for the policy engine, behind the `metrics` feature
#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Histogram, HistogramVec,
    IntCounterVec,
};

#[cfg(feature = "metrics")]
static CIRCUIT_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "policy_circuit_transitions_total",
        "Circuit breaker state transitions",
        &["from", "to"]
    )
    .expect("Failed to register circuit transition metric")
});

#[cfg(feature = "metrics")]
static CIRCUIT_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "policy_circuit_calls_total",
        "Calls observed by the circuit breaker",
        &["state", "result"]
    )
    .expect("Failed to register circuit call metric")
});

#[cfg(feature = "metrics")]
static CIRCUIT_OPEN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "policy_circuit_open_duration_seconds",
        "Time a circuit spent open before admitting a probe"
    )
    .expect("Failed to register circuit open duration metric")
});

#[cfg(feature = "metrics")]
static TIMEOUTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "policy_timeouts_total",
        "Attempts ended by the timeout guard",
        &["result"]
    )
    .expect("Failed to register timeout metric")
});

#[cfg(feature = "metrics")]
static RETRY_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "policy_retry_attempts",
        "Invocations per call, initial attempt included",
        &["result"]
    )
    .expect("Failed to register retry attempt metric")
});

pub struct CircuitBreakerMetrics;

#[cfg(feature = "metrics")]
impl CircuitBreakerMetrics {
    pub fn record_transition(from: &str, to: &str) {
        CIRCUIT_TRANSITIONS.with_label_values(&[from, to]).inc();
    }

    pub fn record_call(state: &str, result: &str) {
        CIRCUIT_CALLS.with_label_values(&[state, result]).inc();
    }

    pub fn record_open_duration(duration_secs: f64) {
        CIRCUIT_OPEN_DURATION.observe(duration_secs);
    }
}

#[cfg(not(feature = "metrics"))]
impl CircuitBreakerMetrics {
    pub fn record_transition(_from: &str, _to: &str) {}
    pub fn record_call(_state: &str, _result: &str) {}
    pub fn record_open_duration(_duration_secs: f64) {}
}

pub struct TimeoutMetrics;

#[cfg(feature = "metrics")]
impl TimeoutMetrics {
    pub fn record(result: &str) {
        TIMEOUTS.with_label_values(&[result]).inc();
    }
}

#[cfg(not(feature = "metrics"))]
impl TimeoutMetrics {
    pub fn record(_result: &str) {}
}

pub struct RetryMetrics;

#[cfg(feature = "metrics")]
impl RetryMetrics {
    pub fn record_attempts(result: &str, attempts: u32) {
        RETRY_ATTEMPTS
            .with_label_values(&[result])
            .observe(attempts as f64);
    }
}

#[cfg(not(feature = "metrics"))]
impl RetryMetrics {
    pub fn record_attempts(_result: &str, _attempts: u32) {}
}
