use std::time::Duration;

use tokio::time::Instant;

/// Admits at most one call per `interval`.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Claim the slot for `now` if the interval since the last claim has passed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_ready(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now >= last + self.interval,
            None => true,
        }
    }

    /// Earliest instant at which `try_acquire` will succeed, if it is
    /// currently blocked.
    pub fn next_ready(&self) -> Option<Instant> {
        self.last.map(|last| last + self.interval)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
