/// Circuit breaker guarding one logical operation
///
/// State transitions:
/// - Closed -> Open: consecutive handled failures reach `failure_threshold`
/// - Open -> HalfOpen: evaluated lazily on the next admission once
///   `break_duration` has elapsed; that caller becomes the single probe
/// - HalfOpen -> Closed: the probe succeeds
/// - HalfOpen -> Open: the probe fails, with a fresh `opened_at`
///
/// While Open, admissions are rejected without invoking the operation and
/// carry the remaining break time. The failure counter survives the Open
/// state and is cleared only on Closed re-entry.
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::failure::ConfigError;
use crate::metrics::CircuitBreakerMetrics;
use crate::observer::PolicyObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, failures counted.
    Closed,
    /// Failing fast, nothing is invoked.
    Open,
    /// One probe allowed through to test recovery.
    HalfOpen,
}

impl CircuitState {
    fn name(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive handled failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe.
    pub break_duration: Duration,
    /// When false, the breaker is a pass-through and never leaves Closed.
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
            enabled: true,
        }
    }
}

impl CircuitBreakerConfig {
    /// Range check for external configuration loaders.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.failure_threshold < 1 || self.failure_threshold > 50 {
            return Err(ConfigError::new(
                "circuit_breaker.failure_threshold",
                format!("{} outside 1..=50", self.failure_threshold),
            ));
        }
        if self.break_duration < Duration::from_secs(1)
            || self.break_duration > Duration::from_secs(3600)
        {
            return Err(ConfigError::new(
                "circuit_breaker.break_duration",
                format!("{:?} outside 1s..=3600s", self.break_duration),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct BreakerInner {
    current: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// The one piece of shared mutable state in the engine. One instance per
/// operation, shared by every concurrent call for that operation; all
/// transitions happen under a single write lock. Observer callbacks fire
/// after the lock is released.
pub struct CircuitBreaker {
    operation: String,
    config: CircuitBreakerConfig,
    observer: Arc<dyn PolicyObserver>,
    state: RwLock<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        operation: impl Into<String>,
        config: CircuitBreakerConfig,
        observer: Arc<dyn PolicyObserver>,
    ) -> Self {
        Self {
            operation: operation.into(),
            config,
            observer,
            state: RwLock::new(BreakerInner {
                current: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Current state, for monitoring.
    pub fn state(&self) -> CircuitState {
        if !self.config.enabled {
            return CircuitState::Closed;
        }
        self.state.read().current
    }

    /// Consecutive handled failures observed so far, for monitoring.
    pub fn consecutive_failures(&self) -> u32 {
        self.state.read().consecutive_failures
    }

    /// Operational override: force the circuit Closed and clear counters.
    pub fn reset(&self) {
        let was_tripped = {
            let mut inner = self.state.write();
            let was_tripped = inner.current != CircuitState::Closed;
            inner.current = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            inner.probe_in_flight = false;
            was_tripped
        };
        if was_tripped {
            self.observer.on_circuit_reset(&self.operation);
        }
    }

    /// Decides whether a call may proceed. `Err` carries the remaining break
    /// time and means the operation must not be invoked. The returned permit
    /// must be settled with the aggregate outcome of the call; dropping it
    /// unsettled releases the probe slot without a verdict.
    pub(crate) fn admit(&self) -> Result<Permit<'_>, Duration> {
        if !self.config.enabled {
            return Ok(Permit {
                breaker: self,
                probe: false,
                tracked: false,
                settled: false,
            });
        }

        let mut half_open = false;
        let mut open_for = None;
        let admitted = {
            let mut inner = self.state.write();
            match inner.current {
                CircuitState::Closed => Ok(false),
                CircuitState::Open => {
                    let remaining = inner
                        .opened_at
                        .map(|t| self.config.break_duration.saturating_sub(t.elapsed()))
                        .unwrap_or(Duration::ZERO);
                    if remaining > Duration::ZERO {
                        Err(remaining)
                    } else {
                        inner.current = CircuitState::HalfOpen;
                        inner.probe_in_flight = true;
                        half_open = true;
                        open_for = inner.opened_at.map(|t| t.elapsed());
                        Ok(true)
                    }
                }
                CircuitState::HalfOpen => {
                    if inner.probe_in_flight {
                        // Another call is already probing; fail fast.
                        Err(Duration::ZERO)
                    } else {
                        inner.probe_in_flight = true;
                        Ok(true)
                    }
                }
            }
        };

        if half_open {
            CircuitBreakerMetrics::record_transition("open", "half_open");
            if let Some(open_for) = open_for {
                CircuitBreakerMetrics::record_open_duration(open_for.as_secs_f64());
            }
            self.observer.on_circuit_half_open(&self.operation);
        }

        match admitted {
            Ok(probe) => Ok(Permit {
                breaker: self,
                probe,
                tracked: true,
                settled: false,
            }),
            Err(remaining) => {
                CircuitBreakerMetrics::record_call(self.state.read().current.name(), "rejected");
                Err(remaining)
            }
        }
    }

    fn record_success(&self, probe: bool) {
        let closed = {
            let mut inner = self.state.write();
            inner.consecutive_failures = 0;
            if probe {
                inner.probe_in_flight = false;
                if inner.current == CircuitState::HalfOpen {
                    inner.current = CircuitState::Closed;
                    inner.opened_at = None;
                    true
                } else {
                    false
                }
            } else {
                false
            }
        };

        CircuitBreakerMetrics::record_call(self.state.read().current.name(), "success");
        if closed {
            CircuitBreakerMetrics::record_transition("half_open", "closed");
            self.observer.on_circuit_reset(&self.operation);
        }
    }

    fn record_failure(&self, probe: bool, descriptor: &str) {
        let opened_from = {
            let mut inner = self.state.write();
            if probe {
                inner.probe_in_flight = false;
                if inner.current == CircuitState::HalfOpen {
                    inner.current = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    Some("half_open")
                } else {
                    None
                }
            } else {
                match inner.current {
                    CircuitState::Closed => {
                        inner.consecutive_failures += 1;
                        if inner.consecutive_failures >= self.config.failure_threshold {
                            inner.current = CircuitState::Open;
                            inner.opened_at = Some(Instant::now());
                            Some("closed")
                        } else {
                            None
                        }
                    }
                    // A concurrent call already tripped the breaker while
                    // this one was in flight.
                    CircuitState::Open | CircuitState::HalfOpen => None,
                }
            }
        };

        CircuitBreakerMetrics::record_call(self.state.read().current.name(), "failure");
        if let Some(from) = opened_from {
            CircuitBreakerMetrics::record_transition(from, "open");
            self.observer
                .on_circuit_open(&self.operation, descriptor, self.config.break_duration);
        }
    }

    fn release(&self, probe: bool) {
        if probe {
            self.state.write().probe_in_flight = false;
        }
    }
}

/// Admission token for one call. Settle with [`Permit::success`] or
/// [`Permit::failure`] once the full retry sequence has an outcome;
/// [`Permit::abandon`] (or a plain drop, e.g. when the caller's future is
/// dropped mid-flight) frees the probe slot without recording a verdict.
pub(crate) struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    tracked: bool,
    settled: bool,
}

impl Permit<'_> {
    pub(crate) fn success(mut self) {
        self.settled = true;
        if self.tracked {
            self.breaker.record_success(self.probe);
        }
    }

    pub(crate) fn failure(mut self, descriptor: &str) {
        self.settled = true;
        if self.tracked {
            self.breaker.record_failure(self.probe, descriptor);
        }
    }

    pub(crate) fn abandon(mut self) {
        self.settled = true;
        if self.tracked {
            self.breaker.release(self.probe);
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.tracked && !self.settled {
            self.breaker.release(self.probe);
        }
    }
}
