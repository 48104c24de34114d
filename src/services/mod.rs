//! # Service abstractions.
//!
//! - [`ServiceSpec`] - static declaration of a service
//! - [`Launch`] / [`LaunchFn`] / [`CommandLauncher`] - start directives
//! - [`ServiceHandle`] - handle to a started instance

mod command;
mod handle;
mod launch;
mod spec;

pub use command::CommandLauncher;
pub use handle::ServiceHandle;
pub use launch::{Launch, LaunchContext, LaunchFn, LaunchRef};
pub use spec::ServiceSpec;
