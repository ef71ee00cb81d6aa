//! Linear reconnect backoff.

use std::time::Duration;

/// Delay before the next reconnect attempt.
///
/// Each consecutive failure adds `delta` to the delay; a successful open
/// resets it to `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    delta: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, delta: Duration) -> Self {
        Self {
            base,
            delta,
            current: base,
        }
    }

    /// Returns the delay for this attempt and advances to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_add(self.delta);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Delay the next attempt would use.
    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(1000))
    }
}
