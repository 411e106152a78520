use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff bounded by a total elapsed-time ceiling.
///
/// Pure value: the caller tracks attempts and elapsed time and asks for the
/// next delay. No jitter, so schedules are reproducible in tests.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(3),
            multiplier: 1.5,
            max_interval: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(5 * 60),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `failed_attempts` failures, `elapsed` into the
    /// operation. `None` means give up.
    ///
    /// Gives up when sleeping the next delay would cross `max_elapsed`.
    pub fn next_delay(
        &self,
        failed_attempts: u32,
        elapsed: Duration,
    ) -> Option<Duration> {
        if failed_attempts == 0 {
            return Some(Duration::ZERO);
        }

        let delay = self.interval_for(failed_attempts);
        if elapsed.saturating_add(delay) > self.max_elapsed {
            return None;
        }
        Some(delay)
    }

    fn interval_for(&self, failed_attempts: u32) -> Duration {
        let exponent = i32::try_from(failed_attempts - 1).unwrap_or(i32::MAX);
        let secs =
            self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);

        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}
