//! # Dependency gate.
//!
//! [`DependencyGate::await_ready`] decides whether a service may start: every
//! declared dependency must answer its own readiness probe.
//!
//! ```text
//! await_ready(app, [db, cache])
//!   ├─ db    ─► readiness loop (db's interval/timeout/retries) ─┐
//!   └─ cache ─► readiness loop (cache's ...)                    ├─► all Ok  → GateCleared
//!                                                               └─► any Err → fail fast
//! ```
//!
//! ## Rules
//! - Dependencies are probed concurrently, each with its own retry counter.
//! - The first dependency to exhaust its budget fails the whole call; the other
//!   probes are dropped immediately.
//! - A dependency without a running handle (never started, or Failed) fails the
//!   call without probing.
//! - The gate only reports; service state belongs to the supervisor.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;

use crate::error::GateError;
use crate::events::{Bus, Event, EventKind};
use crate::probe::readiness::{wait_until_healthy, ProbeSubject, Unready};
use crate::registry::Registry;
use crate::services::ServiceHandle;

/// Running handles by service name.
pub type StartedMap = HashMap<Arc<str>, ServiceHandle>;

/// Clears the preconditions of one service at a time.
#[derive(Clone, Debug)]
pub struct DependencyGate {
    bus: Bus,
}

impl DependencyGate {
    /// Creates a gate publishing probe events to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self { bus }
    }

    /// Waits until every dependency of `dependent` answers healthy.
    ///
    /// Returns [`GateError::DependencyUnhealthy`] naming the first dependency that
    /// is missing from `started` or exhausts its retries, and
    /// [`GateError::Cancelled`] if `token` fires first.
    pub async fn await_ready(
        &self,
        dependent: &str,
        dependencies: &[String],
        registry: &Registry,
        started: &StartedMap,
        token: &CancellationToken,
    ) -> Result<(), GateError> {
        let dependent: Arc<str> = Arc::from(dependent);

        let waits = dependencies.iter().map(|dep| {
            let dependent = Arc::clone(&dependent);
            async move {
                let unhealthy = || GateError::DependencyUnhealthy(dep.clone());
                let (Some(spec), Some(handle)) = (registry.get(dep), started.get(dep.as_str()))
                else {
                    return Err(unhealthy());
                };
                let subject = ProbeSubject::dependency_of(spec.name_arc(), dependent);
                match wait_until_healthy(&subject, spec.probe(), handle, token, &self.bus).await {
                    Ok(_attempts) => Ok(()),
                    Err(Unready::Exhausted { .. }) => Err(unhealthy()),
                    Err(Unready::Cancelled) => Err(GateError::Cancelled),
                }
            }
        });

        try_join_all(waits).await?;

        self.bus
            .publish(Event::new(EventKind::GateCleared).with_service(dependent));
        Ok(())
    }
}
