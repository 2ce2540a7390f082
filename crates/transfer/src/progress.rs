use std::time::{Duration, Instant};

use crate::PROGRESS_INTERVAL;

/// Batch completion percentage, capped at 100.
///
/// `None` when the total is unknown: the caller reports bytes moved and
/// leaves the percentage indeterminate.
pub fn percent_of(transferred: u64, total: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((transferred as f64 / total as f64 * 100.0).min(100.0))
}

/// Rate limiter for per-file `progress` events.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Instant,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(PROGRESS_INTERVAL)
    }
}

impl ProgressThrottle {
    /// Starts the window now; the first event may fire after `interval`.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    /// Returns true, and restarts the window, once `interval` has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
