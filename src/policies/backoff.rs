//! # Failure backoff for worker processes.
//!
//! A worker that fails sleeps for [`BackoffPolicy::next`] before it exits, so a
//! slot that keeps failing does not turn into a fork loop. The attempt number
//! is the slot's count of consecutive failed exits, tracked by the master and
//! handed to each new worker.
//!
//! The delay for attempt `n` is `first × factor^n`, clamped to `max`, then
//! jittered. The base is derived from the attempt number alone, so jitter never
//! feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use pipevisor::{BackoffPolicy, JitterPolicy};
//!
//! let steady = BackoffPolicy::constant(Duration::from_secs(1));
//! assert_eq!(steady.next(0), Duration::from_secs(1));
//! assert_eq!(steady.next(7), Duration::from_secs(1));
//!
//! let growing = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(4),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(growing.next(2), Duration::from_secs(1));
//! assert_eq!(growing.next(9), Duration::from_secs(4));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay applied before a failed worker exits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure of a slot.
    pub first: Duration,
    /// Cap.
    pub max: Duration,
    /// Growth per consecutive failure (`1.0` keeps the delay constant).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant one second, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// The same `delay` after every failure.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// No delay at all.
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    /// Delay for the given number of consecutive prior failures.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_one_second_constant() {
        let policy = BackoffPolicy::default();
        for attempt in [0, 1, 5, 1000] {
            assert_eq!(policy.next(attempt), Duration::from_secs(1));
        }
    }

    #[test]
    fn none_never_sleeps() {
        assert_eq!(BackoffPolicy::none().next(3), Duration::ZERO);
    }

    #[test]
    fn exponential_growth_is_capped() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn equal_jitter_stays_within_half_and_full() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::Equal,
        };
        for attempt in 0..50 {
            let delay = policy.next(attempt);
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay <= Duration::from_millis(1000), "{delay:?}");
        }
    }

    #[test]
    fn decorrelated_jitter_respects_floor_and_cap() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(3),
            factor: 2.0,
            jitter: JitterPolicy::Decorrelated,
        };
        for _ in 0..100 {
            let delay = policy.next(6);
            assert!(delay >= Duration::from_millis(100), "{delay:?}");
            assert!(delay <= Duration::from_secs(3), "{delay:?}");
        }
    }
}
