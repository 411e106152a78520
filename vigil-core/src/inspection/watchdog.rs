use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::time::Instant;

const NEVER: u64 = u64::MAX;

/// Time of the last block-progress signal.
///
/// Written by the block handler, read by the watchdog ticker. The two race
/// benignly; the worst case is one extra or one skipped watchdog trigger.
/// A clock that was never signalled counts as silent.
#[derive(Debug)]
pub struct WatchdogClock {
    origin: Instant,
    last_signal_ms: AtomicU64,
}

impl Default for WatchdogClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_signal_ms: AtomicU64::new(NEVER),
        }
    }

    pub fn signal(&self) {
        let now = millis(self.origin.elapsed());
        self.last_signal_ms.store(now, Ordering::Relaxed);
    }

    /// Time since the last signal, `None` if there never was one.
    pub fn silent_for(&self) -> Option<Duration> {
        match self.last_signal_ms.load(Ordering::Relaxed) {
            NEVER => None,
            last => {
                let now = millis(self.origin.elapsed());
                Some(Duration::from_millis(now.saturating_sub(last)))
            }
        }
    }

    /// Strictly more than `threshold` without a signal.
    pub fn is_silent(&self, threshold: Duration) -> bool {
        self.silent_for()
            .is_none_or(|silence| silence > threshold)
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(NEVER - 1)
}
