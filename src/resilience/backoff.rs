//! Capped exponential backoff for transient accept errors.

use std::time::Duration;

/// First delay after a transient accept error.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(5);

/// Upper bound on the accept retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Backoff state for consecutive transient accept errors.
///
/// The first delay is `initial`, each following one doubles, and the
/// delay never exceeds `max`. A successful accept calls [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct AcceptBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl AcceptBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: Duration::ZERO,
        }
    }

    /// Advance to the next delay and return it.
    pub fn next_delay(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            self.initial
        } else {
            self.current.saturating_mul(2)
        };
        if self.current > self.max {
            self.current = self.max;
        }
        self.current
    }

    /// Forget previous failures.
    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }

    /// The last delay handed out, zero after a reset.
    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF)
    }
}
