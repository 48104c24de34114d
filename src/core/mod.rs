//! Runtime core: orchestration of one deployment.
//!
//! The public API from this module is [`Supervisor`] (with its builder and
//! configuration) and the per-service state it exposes.
//!
//! Internal modules:
//! - [`bringup`]: gate, start and own-readiness of a single service;
//! - [`supervisor`]: scheduling loop, single writer of service state;
//! - [`state`]: monotonic per-service state table;
//! - [`shutdown`]: OS termination signals.

mod bringup;
mod builder;
mod config;
mod shutdown;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use state::{ServiceState, ServiceStatus};
pub use supervisor::Supervisor;
