/// Failure taxonomy for the policy pipeline
///
/// Retry and circuit-breaker decisions are made by inspecting classified
/// values, never by catching panics or sniffing error strings. The unit of
/// work's error type declares its own class through [`ClassifyFailure`].
use std::time::Duration;

/// Classification verdict for a failed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying: network-level failures, 5xx-style responses,
    /// rate limiting.
    Transient,
    /// Fail fast without spending retry budget: validation-class and
    /// other client-side errors.
    Permanent,
}

/// Classifies a failed unit of work for the retry executor.
///
/// Implemented by the collaborator's error type. The circuit breaker counts
/// both classes as failures; only [`FailureClass::Transient`] drives retries.
pub trait ClassifyFailure {
    fn classify(&self) -> FailureClass;
}

// Convenient for tests and quick prototyping with string errors.
impl ClassifyFailure for String {
    fn classify(&self) -> FailureClass {
        FailureClass::Transient
    }
}

impl ClassifyFailure for &str {
    fn classify(&self) -> FailureClass {
        FailureClass::Transient
    }
}

/// Terminal outcome of an executed pipeline.
///
/// The executor never swallows a failure: every call ends in `Ok` or in
/// exactly one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError<E> {
    /// The circuit for this operation is open; the work was never invoked.
    /// `retry_after` is the remaining break time, as backoff guidance.
    #[error("circuit open for operation {operation}, retry after {retry_after:?}")]
    CircuitOpen {
        operation: String,
        retry_after: Duration,
    },

    /// The final attempt exceeded the per-attempt time limit.
    #[error("operation timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// The caller's cancellation signal fired. Always terminal, never
    /// counted as a service failure.
    #[error("operation cancelled by caller")]
    Cancelled,

    /// A transient failure survived the whole retry budget.
    /// `attempts` is the total invocation count, initial try included.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The failure was classified permanent and failed fast.
    #[error("non-retryable failure: {0}")]
    Rejected(E),
}

impl<E> PolicyError<E> {
    /// True when the wrapped operation was never invoked for this call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, PolicyError::CircuitOpen { .. })
    }

    /// The collaborator's failure, if one was observed.
    pub fn into_inner(self) -> Option<E> {
        match self {
            PolicyError::Exhausted { last, .. } => Some(last),
            PolicyError::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

/// Raised by `validate()` on the config structs. Intended for external
/// configuration loaders; the hot path never validates.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}
