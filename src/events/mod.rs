//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the supervisor loop, bring-up tasks, the dependency gate,
//!   readiness loops and `SubscriberSet` workers (overflow/panic).
//! - **Consumer**: the listener spawned by `SupervisorBuilder::build`, which fans
//!   events out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
