//! Reconnection policy and retry bookkeeping.
//!
//! After an unexpected disconnect the relay arms a single retry timer,
//! and only while consumers remain registered. Arming is idempotent: a
//! second disconnect notification while a retry is pending does nothing.
//! A successful connect resets the attempt count.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;

// ============================================================================
// Constants
// ============================================================================

/// Default delay between reconnection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// How long to wait before each reconnection attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),

    /// Capped exponential backoff.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Upper bound on the delay.
        max: Duration,
        /// Growth factor per consecutive failure.
        factor: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RETRY_DELAY)
    }
}

impl ReconnectPolicy {
    /// Fixed-interval policy.
    #[inline]
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self::Fixed(delay)
    }

    /// Capped exponential policy.
    #[inline]
    #[must_use]
    pub const fn exponential(initial: Duration, max: Duration, factor: f64) -> Self {
        Self::Exponential {
            initial,
            max,
            factor,
        }
    }

    /// Delay before the retry following `failures` consecutive failures.
    ///
    /// `failures` starts at 1 for the first retry.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential {
                initial,
                max,
                factor,
            } => {
                let exponent = failures.saturating_sub(1).min(32) as i32;
                let scaled = initial.as_secs_f64() * factor.max(1.0).powi(exponent);
                if scaled.is_finite() && scaled < max.as_secs_f64() {
                    Duration::from_secs_f64(scaled)
                } else {
                    max
                }
            }
        }
    }
}

// ============================================================================
// RetryState
// ============================================================================

/// Retry bookkeeping owned by the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Consecutive failed attempts since the last successful connect.
    attempt: u32,
    /// When the pending retry fires.
    deadline: Option<Instant>,
}

impl RetryState {
    /// Arms a retry unless one is already pending.
    ///
    /// Returns the delay if a retry was armed.
    pub fn arm(&mut self, now: Instant, policy: &ReconnectPolicy) -> Option<Duration> {
        if self.deadline.is_some() {
            return None;
        }

        self.attempt = self.attempt.saturating_add(1);
        let delay = policy.delay_for(self.attempt);
        self.deadline = Some(now + delay);
        Some(delay)
    }

    /// Cancels a pending retry, keeping the attempt count.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Marks the pending retry as fired.
    ///
    /// Returns `true` if a retry was pending.
    pub fn fire(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Cancels any pending retry and resets the attempt count.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` if a retry is pending.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the pending retry fires.
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consecutive failed attempts.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_fixed_three_seconds() {
        assert_eq!(ReconnectPolicy::default(), ReconnectPolicy::Fixed(DEFAULT_RETRY_DELAY));
        assert_eq!(ReconnectPolicy::default().delay_for(7), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_is_capped() {
        let policy = ReconnectPolicy::exponential(
            Duration::from_millis(500),
            Duration::from_secs(4),
            2.0,
        );
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(4), Duration::from_secs(4));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(4));
    }

    #[test]
    fn test_arm_is_idempotent() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(100));
        let now = Instant::now();
        let mut retry = RetryState::default();

        assert_eq!(retry.arm(now, &policy), Some(Duration::from_millis(100)));
        let deadline = retry.deadline();

        assert_eq!(retry.arm(now + Duration::from_millis(50), &policy), None);
        assert_eq!(retry.deadline(), deadline);
        assert_eq!(retry.attempt(), 1);
    }

    #[test]
    fn test_fire_then_rearm_counts_attempts() {
        let policy = ReconnectPolicy::default();
        let now = Instant::now();
        let mut retry = RetryState::default();

        retry.arm(now, &policy);
        assert!(retry.fire());
        assert!(!retry.fire());
        retry.arm(now, &policy);
        assert_eq!(retry.attempt(), 2);

        retry.cancel();
        assert!(!retry.is_pending());
        assert_eq!(retry.attempt(), 2);

        retry.reset();
        assert_eq!(retry, RetryState::default());
    }
}
