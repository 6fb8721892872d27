use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Sleep seam for backoff and simulated validation work.
///
/// Injected so the retry schedule can be exercised in tests without real
/// waiting.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deterministic clock for tests: resolves immediately and records every
/// requested duration so the backoff schedule can be asserted on.
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in call order.
    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("manual clock poisoned").clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .expect("manual clock poisoned")
            .push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_clock_records_without_waiting() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(50)).await;
        clock.sleep(Duration::from_millis(100)).await;
        assert_eq!(
            clock.recorded(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
    }
}
