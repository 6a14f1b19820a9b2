//! Pure, stateless retry policy.
//!
//! The policy is a value passed into the ledger client, decoupled from
//! connection state: the client asks "how long before attempt n?" and the
//! policy answers without holding counters of its own.

use std::time::Duration;

// ============================================================================
// Backoff
// ============================================================================

/// Shape of the delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed,
    /// Delay doubles with each retry, capped at `max`.
    Exponential { max: Duration },
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Bounded retry with a configurable delay shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay before a retry.
    pub delay: Duration,
    /// How the delay grows across retries.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
            backoff: Backoff::Fixed,
        }
    }

    /// Fixed-delay retries.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    /// Exponential backoff capped at `max`.
    pub fn exponential(max_retries: u32, delay: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            delay,
            backoff: Backoff::Exponential { max },
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Returns `None` once retries are exhausted.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }

        let delay = match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max } => {
                let factor = 2u32.saturating_pow(retry - 1);
                self.delay.saturating_mul(factor).min(max)
            }
        };
        Some(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(500))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(100));

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(100)));
    }

    #[test]
    fn retries_are_bounded() {
        let policy = RetryPolicy::fixed(2, Duration::from_millis(10));

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(3), None);
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let policy = RetryPolicy::exponential(
            5,
            Duration::from_millis(100),
            Duration::from_millis(350),
        );

        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(350))); // capped
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(350)));
    }

    #[test]
    fn none_never_retries() {
        let policy = RetryPolicy::none();

        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for(1), None);
    }
}
