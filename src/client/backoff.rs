//! Reconnect delay policy.
//!
//! Delays grow geometrically without jitter:
//! `base * multiplier^attempt`, for `attempt` in `0..max_attempts`.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::config::ClientConfig;

// ============================================================================
// Backoff
// ============================================================================

/// Exponential backoff bounded by an attempt count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    multiplier: f64,
    max_attempts: u32,
}

impl Backoff {
    /// Creates a policy.
    #[inline]
    #[must_use]
    pub const fn new(base: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base,
            multiplier,
            max_attempts,
        }
    }

    /// Policy described by a client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.reconnect_interval,
            config.backoff_multiplier,
            config.reconnect_attempts,
        )
    }

    /// Delay before reconnect number `attempt` (0-indexed).
    ///
    /// Returns `None` once `attempt` reaches the attempt limit.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        Some(
            Duration::try_from_secs_f64(self.base.as_secs_f64() * factor)
                .unwrap_or(Duration::MAX),
        )
    }

    /// Attempt limit.
    #[inline]
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_law() {
        let backoff = Backoff::new(Duration::from_millis(1000), 1.5, 3);

        assert_eq!(backoff.delay(0), Some(Duration::from_millis(1000)));
        assert_eq!(backoff.delay(1), Some(Duration::from_millis(1500)));
        assert_eq!(backoff.delay(2), Some(Duration::from_millis(2250)));
        assert_eq!(backoff.delay(3), None);
    }

    #[test]
    fn test_defaults_from_config() {
        let backoff = Backoff::from_config(&ClientConfig::default());

        assert_eq!(backoff.max_attempts(), 10);
        assert_eq!(backoff.delay(0), Some(Duration::from_secs(2)));
        assert_eq!(backoff.delay(1), Some(Duration::from_secs(3)));
        assert_eq!(backoff.delay(10), None);
    }

    #[test]
    fn test_zero_attempts_never_reconnects() {
        let backoff = Backoff::new(Duration::from_secs(1), 1.5, 0);
        assert_eq!(backoff.delay(0), None);
    }

    #[test]
    fn test_huge_delay_saturates() {
        let backoff = Backoff::new(Duration::from_secs(1), 10.0, u32::MAX);
        assert_eq!(backoff.delay(400), Some(Duration::MAX));
    }
}
