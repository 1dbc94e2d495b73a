//! Reconnect backoff policy.
//!
//! Delay for attempt `k` (1-based) is `min(cap, 2^k - 1)` seconds:
//!
//! | k | 1 | 2 | 3 | 4 | 5 | 6+ |
//! |---|---|---|---|---|---|----|
//! | delay (s) | 1 | 3 | 7 | 15 | 30 | 30 |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default upper bound on the reconnect delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

// ============================================================================
// Backoff
// ============================================================================

/// Capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Upper bound on any single delay.
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKOFF)
    }
}

impl Backoff {
    /// Creates a backoff capped at `max`.
    #[inline]
    #[must_use]
    pub const fn new(max: Duration) -> Self {
        Self { max }
    }

    /// Returns the cap.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Returns the delay before retry number `attempt`.
    ///
    /// Attempt 0 is treated like attempt 1.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        // 2^63 seconds already exceeds any sane cap
        let secs = if attempt >= 63 {
            u64::MAX
        } else {
            (1u64 << attempt) - 1
        };
        Duration::from_secs(secs).min(self.max)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_default_schedule() {
        let backoff = Backoff::default();
        let delays: Vec<u64> = (1..=6).map(|k| backoff.delay(k).as_secs()).collect();
        assert_eq!(delays, vec![1, 3, 7, 15, 30, 30]);
    }

    #[test]
    fn test_zero_attempt() {
        assert_eq!(Backoff::default().delay(0), Duration::from_secs(1));
    }

    #[test]
    fn test_huge_attempt_saturates() {
        assert_eq!(Backoff::default().delay(u32::MAX), DEFAULT_MAX_BACKOFF);
    }

    #[test]
    fn test_custom_cap() {
        let backoff = Backoff::new(Duration::from_secs(5));
        assert_eq!(backoff.delay(2), Duration::from_secs(3));
        assert_eq!(backoff.delay(3), Duration::from_secs(5));
    }

    proptest! {
        #[test]
        fn prop_delay_is_capped_and_monotonic(k in 1u32..200) {
            let backoff = Backoff::default();
            prop_assert!(backoff.delay(k) <= DEFAULT_MAX_BACKOFF);
            prop_assert!(backoff.delay(k) <= backoff.delay(k + 1));
            prop_assert!(backoff.delay(k) >= Duration::from_secs(1));
        }
    }
}
