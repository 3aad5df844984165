//! Reconnect delay policy

use std::time::Duration;

/// Delay used between reconnect attempts by default
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// How long to wait before each reconnect, and when to give up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect
    pub initial_delay: Duration,
    /// Growth factor per consecutive failure (1.0 keeps the delay flat)
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Give up after this many consecutive failures; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Same delay every time, unbounded
    #[inline]
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts: None,
        }
    }

    /// Doubling delay from `initial` up to `max`, unbounded
    #[inline]
    #[must_use]
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_delay: initial,
            multiplier: 2.0,
            max_delay: max.max(initial),
            max_attempts: None,
        }
    }

    /// With attempt cap
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Delay before reconnect number `attempt` (1-based)
    ///
    /// Returns `None` once the attempt cap is exceeded.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let max = self.max_delay.max(self.initial_delay);

        if !secs.is_finite() || secs >= max.as_secs_f64() {
            Some(max)
        } else {
            Some(Duration::from_secs_f64(secs))
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}
