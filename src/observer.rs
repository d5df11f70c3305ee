/// Observability hooks for policy transitions
///
/// The engine stays decoupled from any particular logging or metrics stack:
/// consumers inject a [`PolicyObserver`] at construction and receive a
/// synchronous callback at every transition. Implementations must not panic
/// and should return quickly; expensive work belongs on a channel.
///
/// Failures are passed as pre-rendered descriptors. The engine never
/// enriches them; redacting sensitive fields before logging is the
/// observer's job.
use std::time::Duration;

use tracing::{info, warn};

use crate::context::ExecutionContext;

pub trait PolicyObserver: Send + Sync {
    /// A retryable failure was observed and a retry is scheduled after
    /// `delay`.
    fn on_retry(&self, _ctx: &ExecutionContext, _delay: Duration, _failure: &str) {}

    /// The circuit for `operation` transitioned to Open.
    fn on_circuit_open(&self, _operation: &str, _failure: &str, _break_duration: Duration) {}

    /// The break elapsed and the circuit now admits a single probe.
    fn on_circuit_half_open(&self, _operation: &str) {}

    /// The probe succeeded; the circuit is Closed again.
    fn on_circuit_reset(&self, _operation: &str) {}

    /// An attempt exceeded its per-attempt limit.
    fn on_timeout(&self, _ctx: &ExecutionContext, _limit: Duration) {}
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PolicyObserver for NoopObserver {}

/// Observer that emits one `tracing` event per transition, with the
/// correlation id as a structured field wherever a context is in scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PolicyObserver for TracingObserver {
    fn on_retry(&self, ctx: &ExecutionContext, delay: Duration, failure: &str) {
        warn!(
            operation = %ctx.operation(),
            correlation_id = %ctx.correlation_id(),
            attempt = ctx.attempt(),
            delay_ms = delay.as_millis() as u64,
            %failure,
            "retrying after failure"
        );
    }

    fn on_circuit_open(&self, operation: &str, failure: &str, break_duration: Duration) {
        warn!(
            operation = %operation,
            break_secs = break_duration.as_secs(),
            %failure,
            "circuit breaker: closed -> open"
        );
    }

    fn on_circuit_half_open(&self, operation: &str) {
        info!(operation = %operation, "circuit breaker: open -> half-open, probing");
    }

    fn on_circuit_reset(&self, operation: &str) {
        info!(operation = %operation, "circuit breaker: half-open -> closed, service recovered");
    }

    fn on_timeout(&self, ctx: &ExecutionContext, limit: Duration) {
        warn!(
            operation = %ctx.operation(),
            correlation_id = %ctx.correlation_id(),
            attempt = ctx.attempt(),
            limit_ms = limit.as_millis() as u64,
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "attempt timed out"
        );
    }
}
