/// Per-call execution context threaded through every policy layer
///
/// Carries correlation tracking for one logical call across all of its retry
/// attempts. Created by the executor, mutated only by the retry loop,
/// exposed read-only to observers, discarded when the call returns.
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    correlation_id: String,
    operation: String,
    attempt: u32,
    started_at: Instant,
    last_failure: Option<String>,
}

impl ExecutionContext {
    /// Creates a context for one logical call. A correlation id is generated
    /// when the caller does not supply one; either way it never changes for
    /// the lifetime of the call.
    pub fn new(operation: impl Into<String>, correlation_id: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            operation: operation.into(),
            attempt: 0,
            started_at: Instant::now(),
            last_failure: None,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// The logical operation name, e.g. `"GET /rest/v1.0/companies"`.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Zero-based retry counter: 0 for the initial try, incremented before
    /// each retry. Monotonically non-decreasing within a call.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Wall-clock time since the first attempt started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Description of the most recent failed attempt, if any.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub(crate) fn next_attempt(&mut self) {
        self.attempt += 1;
    }

    pub(crate) fn record_failure(&mut self, descriptor: String) {
        self.last_failure = Some(descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_correlation_id_when_absent() {
        let ctx = ExecutionContext::new("GET /companies", None);
        assert!(!ctx.correlation_id().is_empty());
        assert_eq!(ctx.operation(), "GET /companies");
        assert_eq!(ctx.attempt(), 0);
    }

    #[test]
    fn test_keeps_caller_supplied_correlation_id() {
        let ctx = ExecutionContext::new("op", Some("abc-123".into()));
        assert_eq!(ctx.correlation_id(), "abc-123");
    }

    #[test]
    fn test_attempt_counter_and_last_failure() {
        let mut ctx = ExecutionContext::new("op", None);
        ctx.record_failure("connection reset".into());
        ctx.next_attempt();
        ctx.record_failure("503".into());
        ctx.next_attempt();

        assert_eq!(ctx.attempt(), 2);
        assert_eq!(ctx.last_failure(), Some("503"));
    }
}
