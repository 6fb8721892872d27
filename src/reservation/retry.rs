//! Bounded retry with linear backoff for the optimistic protocol.

use std::time::Duration;

/// Retry policy for optimistic reservations.
///
/// Attempts are numbered from 1. The backoff before retrying attempt `n + 1`
/// is `base_delay × n`: linear in the attempt index, not exponential. Only a
/// `Conflict` with attempts remaining is retried; every attempt runs on its
/// own transaction, fully rolled back before the backoff sleep starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay inserted after the given failed attempt, before the next one.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Whether another attempt may run after `attempt` failed with a conflict.
    pub fn attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
