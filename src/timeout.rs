/// Per-attempt timeout guard
use std::future::Future;
use std::time::Duration;

use crate::failure::ConfigError;

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Wall-clock limit for a single attempt.
    pub per_attempt: Duration,
    /// When false, attempts run unbounded.
    pub enabled: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            per_attempt: Duration::from_secs(30),
            enabled: true,
        }
    }
}

impl TimeoutConfig {
    /// Range check for external configuration loaders.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled
            && (self.per_attempt < Duration::from_millis(1)
                || self.per_attempt > Duration::from_secs(3600))
        {
            return Err(ConfigError::new(
                "timeout.per_attempt",
                format!("{:?} outside 1ms..=3600s", self.per_attempt),
            ));
        }
        Ok(())
    }
}

/// Produced when an attempt exceeds its limit. Dropping the timed-out future
/// cancels the in-flight work cooperatively, so nothing leaks into the next
/// attempt.
#[derive(Debug, thiserror::Error)]
#[error("attempt exceeded {limit:?}")]
pub struct AttemptTimedOut {
    pub limit: Duration,
}

/// Runs one attempt under the configured limit. Each call arms its own
/// timer; nothing is shared between attempts.
pub async fn bound_attempt<F, T>(config: &TimeoutConfig, attempt: F) -> Result<T, AttemptTimedOut>
where
    F: Future<Output = T>,
{
    if !config.enabled {
        return Ok(attempt.await);
    }

    tokio::time::timeout(config.per_attempt, attempt)
        .await
        .map_err(|_| AttemptTimedOut {
            limit: config.per_attempt,
        })
}
