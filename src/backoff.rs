/// Bounded, jittered backoff delays between retry attempts
use rand::Rng;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Computes the delay before retry `attempt` (1-based; values below 1 are
/// treated as 1 so the exponent never goes negative).
///
/// Exponential backoff grows the base delay by `backoff_multiplier` per
/// attempt, clamped to `max_delay`. Jitter then adds a uniform random
/// duration in `[0, max_jitter)` from a thread-safe source, so many clients
/// retrying in lockstep spread out instead of hammering in unison.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let attempt = attempt.max(1);

    let base_ms = config.base_delay.as_millis() as f64;
    let mut delay_ms = if config.use_exponential_backoff {
        base_ms * config.backoff_multiplier.powi(attempt as i32 - 1)
    } else {
        base_ms
    };

    let max_ms = config.max_delay.as_millis() as f64;
    if delay_ms > max_ms {
        delay_ms = max_ms;
    }

    let mut delay = Duration::from_millis(delay_ms as u64);

    let jitter_bound_ms = config.max_jitter.as_millis() as u64;
    if config.use_jitter && jitter_bound_ms > 0 {
        let jitter_ms = rand::thread_rng().gen_range(0..jitter_bound_ms);
        delay += Duration::from_millis(jitter_ms);
    }

    delay
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            max_jitter: Duration::ZERO,
            use_exponential_backoff: true,
            use_jitter: false,
        }
    }

    #[test]
    fn test_exponential_growth() {
        let cfg = config();
        assert_eq!(compute_delay(&cfg, 1), Duration::from_millis(100));
        assert_eq!(compute_delay(&cfg, 2), Duration::from_millis(200));
        assert_eq!(compute_delay(&cfg, 3), Duration::from_millis(400));
        assert_eq!(compute_delay(&cfg, 4), Duration::from_millis(800));
    }

    #[test]
    fn test_constant_delay_when_backoff_disabled() {
        let cfg = RetryConfig {
            use_exponential_backoff: false,
            ..config()
        };
        assert_eq!(compute_delay(&cfg, 1), Duration::from_millis(100));
        assert_eq!(compute_delay(&cfg, 5), Duration::from_millis(100));
    }

    #[test]
    fn test_clamped_to_max_delay() {
        let cfg = RetryConfig {
            max_delay: Duration::from_millis(300),
            ..config()
        };
        assert_eq!(compute_delay(&cfg, 3), Duration::from_millis(300));
        assert_eq!(compute_delay(&cfg, 10), Duration::from_millis(300));
    }

    #[test]
    fn test_max_delay_below_base_clamps_to_max() {
        let cfg = RetryConfig {
            max_delay: Duration::from_millis(50),
            ..config()
        };
        assert_eq!(compute_delay(&cfg, 1), Duration::from_millis(50));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let cfg = config();
        assert_eq!(compute_delay(&cfg, 0), compute_delay(&cfg, 1));
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let cfg = RetryConfig {
            max_jitter: Duration::from_millis(50),
            use_jitter: true,
            ..config()
        };
        for _ in 0..100 {
            let delay = compute_delay(&cfg, 2);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(250));
        }
    }

    #[test]
    fn test_monotonic_below_clamp() {
        let cfg = config();
        for n in 1..8 {
            assert!(compute_delay(&cfg, n + 1) >= compute_delay(&cfg, n));
        }
    }
}
