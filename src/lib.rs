//! # gatevisor
//!
//! **Gatevisor** starts a statically declared set of services in dependency
//! order, and only lets a service start once every service it depends on
//! answers its readiness probe.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Manifest (YAML) ──► Registry (validated, acyclic, start order)
//!                           │
//!                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (single writer of ServiceState + started handles)     │
//! │  - schedules services whose dependencies are Healthy              │
//! │  - bounds concurrent bring-ups (max_concurrent)                   │
//! │  - blocks transitive dependents of a failed service               │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ BringUp  │       │ BringUp  │       │ BringUp  │   one per service
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        │ DependencyGate: probe every dependency concurrently (fail fast)
//!        │ Launch:         start directive with injected environment
//!        │ Readiness:      own probe until Healthy or retries exhausted
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel)                        │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                          listener ──► SubscriberSet ──► LogWriter, ...
//! ```
//!
//! ### Lifecycle of one service
//! ```text
//! Pending ─► Gating ─► Starting ─► Healthy
//!    └─────────┴──────────┴──────► Failed   (absorbing; dependents are blocked)
//! ```
//!
//! ### Probe loop
//! ```text
//! attempt = 1
//! loop {
//!   probe(def, handle, attempt)       (bounded by def.timeout)
//!   ├─ Success                        ─► done
//!   └─ Failure / Timeout / ProbeError ─► attempt > retries ? give up
//!                                        : sleep(interval, optional backoff) ─► attempt += 1
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                              |
//! |-------------------|-----------------------------------------------------------------|-------------------------------------------------|
//! | **Declaration**   | Services, dependencies, environment, manifests.                 | [`ServiceSpec`], [`Registry`], [`Manifest`]     |
//! | **Probing**       | One-shot checks with timeout, built-in command/TCP checks.      | [`Check`], [`ProbeDefinition`], [`probe()`]     |
//! | **Gating**        | Concurrent, fail-fast readiness of dependencies.                | [`DependencyGate`]                              |
//! | **Launching**     | Start directives as processes or closures.                      | [`Launch`], [`CommandLauncher`], [`LaunchFn`]   |
//! | **Supervision**   | Ordered bring-up, failure isolation, cancellation, snapshots.   | [`Supervisor`], [`ServiceState`]                |
//! | **Subscriber API**| Observe every transition and probe attempt.                     | [`Subscribe`], [`Event`], [`LogWriter`]         |
//! | **Errors**        | Typed errors with stable labels.                                | [`SpecError`], [`DeploymentError`]              |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use gatevisor::{
//!     CheckFn, Health, LaunchContext, LaunchFn, ProbeDefinition, ProbeError, Registry,
//!     ServiceHandle, ServiceSpec, StartError, Supervisor, SupervisorConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let probe = || ProbeDefinition::new(
//!         CheckFn::arc(|_h: ServiceHandle| async { Ok::<_, ProbeError>(Health::Healthy) }),
//!         Duration::from_millis(100),
//!         Duration::from_millis(100),
//!         5,
//!     );
//!     let launch = || LaunchFn::arc(|ctx: LaunchContext| async move {
//!         println!("starting {}", ctx.service());
//!         Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
//!     });
//!
//!     let registry = Registry::new(vec![
//!         ServiceSpec::new("app", launch(), probe()).depends_on(["db"]),
//!         ServiceSpec::new("db", launch(), probe()),
//!     ])?;
//!
//!     let sup = Supervisor::builder(SupervisorConfig::default()).build();
//!     sup.run(Arc::new(registry), CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod gate;
pub mod manifest;
mod policies;
mod probe;
mod process;
mod registry;
mod services;
mod subscribers;
pub mod telemetry;

// ---- Public re-exports ----

pub use crate::core::{ServiceState, ServiceStatus, Supervisor, SupervisorBuilder, SupervisorConfig};
pub use error::{DeploymentError, GateError, ProbeError, SpecError, StartError};
pub use events::{Bus, Event, EventKind};
pub use gate::{DependencyGate, StartedMap};
pub use manifest::{load_registry, Manifest};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use probe::{
    probe, Check, CheckFn, CheckRef, CommandCheck, Health, ProbeDefinition, ProbeOutcome,
    ProbeResult, TcpCheck,
};
pub use process::CommandLine;
pub use registry::Registry;
pub use services::{
    CommandLauncher, Launch, LaunchContext, LaunchFn, LaunchRef, ServiceHandle, ServiceSpec,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
