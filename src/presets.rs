/// Pre-tuned policy configurations for common call profiles
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::executor::PolicyConfig;
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;

/// Everyday API calls (reads, small writes).
///
/// - Timeout: 30s per attempt
/// - Retry: 3 attempts, 1s base delay, exponential with jitter
/// - Circuit breaker: 5 failures, 30s break
pub fn api_default() -> PolicyConfig {
    PolicyConfig {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_jitter: Duration::from_millis(1000),
            use_exponential_backoff: true,
            use_jitter: true,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
            enabled: true,
        },
        timeout: TimeoutConfig {
            per_attempt: Duration::from_secs(30),
            enabled: true,
        },
    }
}

/// Bulk and report-generation endpoints that legitimately run for minutes.
///
/// - Timeout: 300s per attempt
/// - Retry: 2 attempts with long delays
/// - Circuit breaker: more tolerant, 60s break
pub fn long_running() -> PolicyConfig {
    PolicyConfig {
        retry: RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            max_jitter: Duration::from_secs(2),
            use_exponential_backoff: true,
            use_jitter: true,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 10,
            break_duration: Duration::from_secs(60),
            enabled: true,
        },
        timeout: TimeoutConfig {
            per_attempt: Duration::from_secs(300),
            enabled: true,
        },
    }
}

/// Latency-sensitive paths where failing fast beats waiting.
///
/// - Timeout: 5s per attempt
/// - Retry: 2 quick attempts
/// - Circuit breaker: trips early, short 15s break
pub fn aggressive() -> PolicyConfig {
    PolicyConfig {
        retry: RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_jitter: Duration::from_millis(100),
            use_exponential_backoff: true,
            use_jitter: true,
        },
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            break_duration: Duration::from_secs(15),
            enabled: true,
        },
        timeout: TimeoutConfig {
            per_attempt: Duration::from_secs(5),
            enabled: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_default_values() {
        let config = api_default();
        assert_eq!(config.timeout.per_attempt, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_long_running_extends_timeout() {
        let config = long_running();
        assert_eq!(config.timeout.per_attempt, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_aggressive_trips_early() {
        let config = aggressive();
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.timeout.per_attempt, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }
}
