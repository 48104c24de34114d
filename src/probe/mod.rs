//! # Readiness probing.
//!
//! - [`Check`] / [`CheckFn`] / [`CommandCheck`] / [`TcpCheck`] - what to check
//! - [`ProbeDefinition`] - interval, timeout and retry budget
//! - [`probe`] - one attempt, bounded by the timeout
//!
//! The retry loop shared by the supervisor and the dependency gate lives in
//! `readiness` and is crate-private.

mod builtin;
mod check;
mod definition;
mod health;
pub(crate) mod readiness;

pub use builtin::{CommandCheck, TcpCheck};
pub use check::{Check, CheckFn, CheckRef, Health};
pub use definition::ProbeDefinition;
pub use health::{probe, ProbeOutcome, ProbeResult};
