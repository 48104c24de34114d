//! Probe retry policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the delay between probe attempts evolves (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization that keeps probes of many services from lining up
//!
//! ## Wiring
//! ```text
//! ProbeDefinition { interval, backoff_factor, max_interval, jitter }
//!      └─► ProbeDefinition::backoff() ─► BackoffPolicy
//!           └─► readiness loop: backoff.next(attempt - 1) after each failed attempt
//! ```
//!
//! ## Defaults
//! `factor = 1.0`, `max = interval`, `jitter = None`: the loop sleeps exactly the
//! declared interval.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
