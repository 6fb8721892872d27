use std::time::Duration;

use crate::reservation::RetryPolicy;

/// Runtime configuration, read once at startup.
///
/// Environment variables:
/// - `MAX_OPTIMISTIC_RETRIES` — attempt limit for the optimistic path (default 3)
/// - `RETRY_BASE_DELAY_MS` — backoff unit, multiplied by the attempt index (default 50)
/// - `VALIDATION_DELAY_MS` — simulated validation work inside each protocol (default 200)
#[derive(Debug, Clone)]
pub struct Config {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub validation_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(50),
            validation_delay: Duration::from_millis(200),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_parse("MAX_OPTIMISTIC_RETRIES").unwrap_or(defaults.max_retries),
            retry_base_delay: env_parse("RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            validation_delay: env_parse("VALIDATION_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.validation_delay),
        }
    }

    /// Configuration for deterministic tests: no validation delay, no waiting.
    pub fn instant() -> Self {
        Self {
            validation_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: self.retry_base_delay,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}
