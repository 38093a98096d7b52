//! Automatic reconnection policy.
//!
//! Delays grow exponentially from `base_delay` and are capped at
//! `max_delay`. With the defaults the sequence is 500, 1000, 2000, 4000,
//! 8000 ms and then 10 000 ms for every further attempt, up to ten attempts.
//!
//! Delays come from a jitter-free [`ExponentialBackoff`]; the attempt budget
//! is tracked separately.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use backoff::backoff::Backoff as _;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Attempts made before giving up and reporting `error`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Delay before the first reconnect attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for any reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);

/// Growth factor between consecutive delays.
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Doublings after which every delay has hit `max_delay`.
const MAX_DOUBLINGS: u32 = 64;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Configuration for automatic reconnection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum number of consecutive attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before the given 1-based attempt.
    ///
    /// `min(max_delay, base_delay * 2^(attempt - 1))`. Attempt 0 is treated
    /// as attempt 1.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut backoff = ExponentialBackoff::from(*self);
        for _ in 0..attempt.saturating_sub(1).min(MAX_DOUBLINGS) {
            let _ = backoff.next_backoff();
        }
        backoff
            .next_backoff()
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns `true` once `attempts` has reached the budget.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Checks that the delays are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_delay` is zero or `max_delay` is
    /// below `base_delay`.
    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(Error::config("reconnect base delay must be positive"));
        }
        if self.max_delay < self.base_delay {
            return Err(Error::config(
                "reconnect max delay must not be below the base delay",
            ));
        }
        Ok(())
    }
}

impl From<ReconnectPolicy> for ExponentialBackoff {
    fn from(policy: ReconnectPolicy) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(policy.base_delay)
            .with_max_interval(policy.max_delay)
            .with_multiplier(BACKOFF_MULTIPLIER)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None) // attempts are capped by `max_attempts`
            .build()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use backoff::backoff::Backoff as _;

    #[test]
    fn test_default_delay_sequence() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u128> = (1..=7).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_delay_never_exceeds_max() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), DEFAULT_BASE_DELAY);
        assert_eq!(policy.delay_for(u32::MAX), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn test_backoff_has_no_jitter() {
        let mut backoff: ExponentialBackoff = ReconnectPolicy::default().into();
        let delays: Vec<u128> = (0..7)
            .filter_map(|_| backoff.next_backoff())
            .map(|delay| delay.as_millis())
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 10_000, 10_000]);
    }

    #[test]
    fn test_short_policy_sequence() {
        let policy = ReconnectPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
        };
        let delays: Vec<Duration> = (1..=4).map(|n| policy.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(2),
                Duration::from_millis(4),
                Duration::from_millis(8),
                Duration::from_millis(10),
            ]
        );
    }

    #[test]
    fn test_is_exhausted() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.is_exhausted(9));
        assert!(policy.is_exhausted(10));
    }

    #[test]
    fn test_validate() {
        assert!(ReconnectPolicy::default().validate().is_ok());

        let zero = ReconnectPolicy {
            base_delay: Duration::ZERO,
            ..ReconnectPolicy::default()
        };
        assert!(zero.validate().is_err());

        let inverted = ReconnectPolicy {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(1),
            ..ReconnectPolicy::default()
        };
        assert!(inverted.validate().is_err());
    }
}
