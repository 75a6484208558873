//! Reconnect backoff calculation.
//!
//! Delays grow linearly with the attempt number and are capped:
//! `min(attempt × base_delay, max_delay)`. With the defaults (3 s base,
//! 10 s cap) attempts 1..4 wait 3, 6, 9, 10 seconds and every later attempt
//! waits 10 seconds.

use std::time::Duration;

/// Default base delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(3);
/// Default maximum delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Reconnect parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay multiplied by the attempt number.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Give up after this many consecutive failed attempts (`None` = never).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_reconnect_delay(attempt, self.base_delay, self.max_delay)
    }

    /// Whether the given 1-based attempt is still allowed.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }
}

/// Linear capped backoff: `min(attempt × base, max)`.
///
/// Saturates instead of overflowing for very large attempt counts.
#[must_use]
pub fn calculate_reconnect_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(attempt).min(max)
}
