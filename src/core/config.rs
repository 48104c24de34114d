//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the settings of one [`Supervisor`](crate::Supervisor).
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited concurrent bring-ups
//! - `start_timeout = 0s` → the start directive is not time-bounded
//!
//! Probe interval, timeout and retries are per service (see
//! [`ProbeDefinition`](crate::ProbeDefinition)), not global.

use std::time::Duration;

/// Settings of a supervisor run.
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `max_concurrent`: services brought up at the same time (`0` = unlimited,
///   `1` = strictly sequential in start order)
/// - `start_timeout`: bound on each start directive (`0s` = none)
///
/// All fields are public. Prefer the helper accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow listeners lagging more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,

    /// Maximum number of services being gated, started or probed at once.
    ///
    /// A service is never scheduled before its dependencies are Healthy,
    /// regardless of this limit.
    pub max_concurrent: usize,

    /// Maximum time a start directive may take to return a handle.
    pub start_timeout: Duration,
}

impl SupervisorConfig {
    /// Returns the concurrency limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        match self.max_concurrent {
            0 => None,
            n => Some(n),
        }
    }

    /// Returns the start timeout as an `Option` (`None` = unbounded).
    #[inline]
    pub fn start_timeout_opt(&self) -> Option<Duration> {
        if self.start_timeout.is_zero() {
            None
        } else {
            Some(self.start_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// - `bus_capacity = 1024`
    /// - `max_concurrent = 0` (unlimited)
    /// - `start_timeout = 0s` (none)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            max_concurrent: 0,
            start_timeout: Duration::ZERO,
        }
    }
}
