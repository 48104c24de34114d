//! # Bring-up of a single service.
//!
//! A [`BringUp`] takes one service from "scheduled" to a terminal [`Outcome`]:
//!
//! ```text
//! BringUp::run()
//!   ├─► gate.await_ready(deps)        ── Err ──► Outcome::GateFailed / Cancelled
//!   ├─► progress: Starting            (supervisor moves state to Starting)
//!   ├─► publish ServiceStarting
//!   ├─► launch(ctx) [start_timeout]   ── Err ──► Outcome::StartFailed / Cancelled
//!   ├─► publish ServiceStarted
//!   └─► readiness loop (own probe)    ── Ok  ──► Outcome::Healthy { handle, attempts }
//!                                     ── Err ──► Outcome::Unready / Cancelled
//! ```
//!
//! ## Rules
//! - Never touches service state: intermediate steps are reported over the
//!   progress channel, the final result is returned; the supervisor applies both.
//! - Works on an immutable snapshot of the started handles.
//! - Every await point is cancellable through the per-service child token.
//! - Panics are caught by [`BringUp::run_guarded`] and become [`Outcome::Panicked`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{GateError, StartError};
use crate::events::{Bus, Event, EventKind};
use crate::gate::{DependencyGate, StartedMap};
use crate::probe::readiness::{wait_until_healthy, ProbeSubject, Unready};
use crate::registry::Registry;
use crate::services::{LaunchContext, ServiceHandle, ServiceSpec};

/// Intermediate step reported to the supervisor.
#[derive(Debug)]
pub(crate) enum Progress {
    /// Gate cleared; the start directive is about to run.
    Starting(Arc<str>),
}

/// Terminal result of a bring-up.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Started and answered its own probe.
    Healthy { handle: ServiceHandle, attempts: u32 },
    /// A dependency did not pass the gate.
    GateFailed { dependency: String },
    /// The start directive failed or timed out.
    StartFailed(StartError),
    /// Started, but never answered healthy within its retry budget.
    Unready { attempts: u32, reason: String },
    /// The run was cancelled.
    Cancelled,
    /// The bring-up task panicked.
    Panicked(String),
    /// The bring-up task ended without reporting (aborted by the runtime).
    Lost(String),
}

/// Everything one bring-up needs, owned.
pub(crate) struct BringUp {
    pub(crate) spec: ServiceSpec,
    pub(crate) registry: Arc<Registry>,
    pub(crate) started: Arc<StartedMap>,
    pub(crate) gate: DependencyGate,
    pub(crate) bus: Bus,
    pub(crate) start_timeout: Option<Duration>,
    pub(crate) progress: mpsc::UnboundedSender<Progress>,
}

impl BringUp {
    /// Runs the bring-up, turning a panic into [`Outcome::Panicked`].
    pub(crate) async fn run_guarded(self, token: CancellationToken) -> (Arc<str>, Outcome) {
        let name = self.spec.name_arc();
        let outcome = match AssertUnwindSafe(self.run(token)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let info = if let Some(msg) = panic.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = panic.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                Outcome::Panicked(info)
            }
        };
        (name, outcome)
    }

    async fn run(self, token: CancellationToken) -> Outcome {
        let name = self.spec.name_arc();

        let gate = self.gate.await_ready(
            &name,
            self.spec.dependencies(),
            &self.registry,
            &self.started,
            &token,
        );
        match gate.await {
            Ok(()) => {}
            Err(GateError::DependencyUnhealthy(dependency)) => {
                return Outcome::GateFailed { dependency }
            }
            Err(_) => return Outcome::Cancelled,
        }

        let _ = self.progress.send(Progress::Starting(Arc::clone(&name)));
        self.bus
            .publish(Event::new(EventKind::ServiceStarting).with_service(Arc::clone(&name)));

        let handle = match self.launch(&token).await {
            Some(Ok(handle)) => handle,
            Some(Err(e)) => return Outcome::StartFailed(e),
            None => return Outcome::Cancelled,
        };

        let subject = ProbeSubject::own(Arc::clone(&name));
        match wait_until_healthy(&subject, self.spec.probe(), &handle, &token, &self.bus).await {
            Ok(attempts) => Outcome::Healthy { handle, attempts },
            Err(Unready::Exhausted { attempts, last }) => Outcome::Unready {
                attempts,
                reason: last,
            },
            Err(Unready::Cancelled) => Outcome::Cancelled,
        }
    }

    /// Invokes the start directive. `None` means cancelled.
    async fn launch(&self, token: &CancellationToken) -> Option<Result<ServiceHandle, StartError>> {
        let ctx = LaunchContext::new(self.spec.name_arc(), self.spec.environment_arc());
        let begin = Instant::now();
        let launch = self.spec.launch().launch(ctx);

        let res = tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            res = async {
                match self.start_timeout {
                    Some(timeout) => time::timeout(timeout, launch)
                        .await
                        .unwrap_or(Err(StartError::Timeout { timeout })),
                    None => launch.await,
                }
            } => res,
        };

        if let Ok(handle) = &res {
            self.bus.publish(
                Event::new(EventKind::ServiceStarted)
                    .with_service(self.spec.name_arc())
                    .with_pid(handle.pid())
                    .with_elapsed(begin.elapsed()),
            );
        }
        Some(res)
    }
}
