//! # Readiness probe definition.
//!
//! A [`ProbeDefinition`] says *what* to check and *how often*:
//! - `check`: the opaque predicate ([`CheckRef`]);
//! - `interval`: delay between attempts (must be > 0);
//! - `timeout`: per-attempt limit (must be > 0);
//! - `retries`: failed attempts tolerated after the first one, so at most
//!   `retries + 1` attempts are made.
//!
//! Optional interval growth (`backoff_factor`, `max_interval`, `jitter`) defaults
//! to a constant interval.

use std::fmt;
use std::time::Duration;

use crate::error::SpecError;
use crate::policies::{BackoffPolicy, JitterPolicy};
use crate::probe::check::CheckRef;

/// How a service's readiness is checked.
#[derive(Clone)]
pub struct ProbeDefinition {
    check: CheckRef,
    interval: Duration,
    timeout: Duration,
    retries: u32,
    backoff_factor: f64,
    max_interval: Option<Duration>,
    jitter: JitterPolicy,
}

impl ProbeDefinition {
    /// Constant-interval probe. Parameters are validated when the owning service is
    /// registered.
    pub fn new(check: CheckRef, interval: Duration, timeout: Duration, retries: u32) -> Self {
        Self {
            check,
            interval,
            timeout,
            retries,
            backoff_factor: 1.0,
            max_interval: None,
            jitter: JitterPolicy::None,
        }
    }

    /// Grows the interval by `factor` after each failed attempt.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Caps the grown interval.
    pub fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = Some(max);
        self
    }

    /// Randomizes delays between attempts.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// The check to execute.
    pub fn check(&self) -> &CheckRef {
        &self.check
    }

    /// Base delay between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry budget.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Upper bound on attempts (`retries + 1`).
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay schedule derived from the interval settings.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: self.interval,
            max: self.max_interval.unwrap_or(self.interval).max(self.interval),
            factor: self.backoff_factor,
            jitter: self.jitter,
        }
    }

    /// Checks the invariants (`interval > 0`, `timeout > 0`, `retries + 1` fits
    /// in a `u32`, sane backoff).
    pub fn validate(&self, service: &str) -> Result<(), SpecError> {
        let invalid = |reason: String| SpecError::InvalidProbe {
            service: service.to_string(),
            reason,
        };
        if self.interval.is_zero() {
            return Err(invalid("interval must be greater than zero".into()));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout must be greater than zero".into()));
        }
        if self.retries == u32::MAX {
            return Err(invalid(format!("retries must be below {}", u32::MAX)));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(invalid(format!(
                "backoff factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if let Some(max) = self.max_interval {
            if max < self.interval {
                return Err(invalid(format!(
                    "max interval {max:?} is shorter than interval {:?}",
                    self.interval
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ProbeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeDefinition")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("backoff_factor", &self.backoff_factor)
            .field("max_interval", &self.max_interval)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}
