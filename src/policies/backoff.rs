//! # Probe retry schedule.
//!
//! [`BackoffPolicy`] decides how long the readiness loop sleeps between two
//! probe attempts. It is derived from a [`ProbeDefinition`](crate::ProbeDefinition):
//! - [`BackoffPolicy::first`] is the declared probe interval;
//! - [`BackoffPolicy::factor`] grows the interval after each failed attempt;
//! - [`BackoffPolicy::max`] caps the grown interval.
//!
//! The delay after failed attempt `n` (0-indexed) is `first × factor^n`, clamped to
//! `max`, then jittered. The base is derived purely from the attempt number so jitter
//! never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use gatevisor::{BackoffPolicy, JitterPolicy};
//!
//! let steady = BackoffPolicy::constant(Duration::from_secs(5));
//! assert_eq!(steady.next(0), Duration::from_secs(5));
//! assert_eq!(steady.next(7), Duration::from_secs(5));
//!
//! let growing = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(growing.next(1), Duration::from_millis(200));
//! assert_eq!(growing.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Interval schedule between probe attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt (the probe interval).
    pub first: Duration,
    /// Upper bound for grown delays.
    pub max: Duration,
    /// Multiplicative growth factor (`1.0` keeps the interval constant).
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant one second interval, no jitter.
    fn default() -> Self {
        Self::constant(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    /// Fixed interval between attempts.
    pub fn constant(interval: Duration) -> Self {
        Self {
            first: interval,
            max: interval,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay that follows failed attempt number `attempt` (0-indexed).
    ///
    /// - `factor == 1.0`: delay stays at `first` (up to `max`);
    /// - `factor > 1.0`: delay grows exponentially up to `max`;
    /// - overflowing or non-finite values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };
        self.jitter.apply(base)
    }
}
