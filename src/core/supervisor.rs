//! # Supervisor: brings a dependency graph up in order.
//!
//! The [`Supervisor`] owns the event bus, the subscriber listener and the
//! per-service state table. [`Supervisor::run`] drives one deployment:
//!
//! ```text
//! run(registry, token)
//!   states: every service Pending
//!   loop {
//!     schedule: for each Pending service in start order whose dependencies are
//!               all Healthy (and while under max_concurrent):
//!                 state = Gating, publish ServiceGating
//!                 JoinSet.spawn(BringUp::run_guarded(child token, started snapshot))
//!     nothing running?                → done
//!     select! (biased) {
//!       token cancelled               → abandon in-flight bring-ups, Cancelled
//!       progress: Starting(name)      → state = Starting
//!       bring-up finished(name, out)  → Healthy: record handle, unblock dependents
//!                                       else:    Failed + block transitive dependents
//!     }
//!   }
//!   publish DeploymentSucceeded / DeploymentFailed / DeploymentCancelled
//! ```
//!
//! ## Rules
//! - The loop is the only writer of service state and of the started handles;
//!   bring-ups receive an immutable snapshot and report back.
//! - A start directive is never invoked before every dependency is Healthy.
//! - Failures stay local: independent branches keep going.
//! - On cancellation already started services are left running.
//! - One run at a time per supervisor; concurrent calls queue up.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use gatevisor::{
//!     CheckFn, Health, LaunchContext, LaunchFn, LogWriter, ProbeDefinition, ProbeError,
//!     Registry, ServiceHandle, ServiceSpec, StartError, Supervisor, SupervisorConfig,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let probe = || ProbeDefinition::new(
//!         CheckFn::arc(|_h: ServiceHandle| async { Ok::<_, ProbeError>(Health::Healthy) }),
//!         Duration::from_millis(50),
//!         Duration::from_millis(50),
//!         3,
//!     );
//!     let launch = || LaunchFn::arc(|ctx: LaunchContext| async move {
//!         Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
//!     });
//!
//!     let registry = Registry::new(vec![
//!         ServiceSpec::new("db", launch(), probe()),
//!         ServiceSpec::new("app", launch(), probe()).depends_on(["db"]),
//!     ])?;
//!
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build();
//!     sup.run(Arc::new(registry), CancellationToken::new()).await?;
//!     sup.close().await;
//!     Ok(())
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::bringup::{BringUp, Outcome, Progress};
use super::builder::SupervisorBuilder;
use super::config::SupervisorConfig;
use super::shutdown;
use super::state::{ServiceState, ServiceStatus, StateTable};
use crate::error::DeploymentError;
use crate::events::{Bus, Event, EventKind};
use crate::gate::{DependencyGate, StartedMap};
use crate::registry::Registry;

/// Orchestrates gated bring-up of a [`Registry`].
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    states: StateTable,
    run_lock: Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
    listener_stop: CancellationToken,
}

/// Mutable bookkeeping of one run. Lives only inside [`Supervisor::run`].
struct RunState<'r> {
    registry: &'r Registry,
    position: HashMap<&'r str, usize>,
    scheduled: HashSet<&'r str>,
    healthy: HashSet<&'r str>,
    failed: HashSet<&'r str>,
    started: Arc<StartedMap>,
    failures: Vec<(usize, DeploymentError)>,
}

impl Supervisor {
    /// Returns a builder.
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        listener: JoinHandle<()>,
        listener_stop: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            states: StateTable::new(),
            run_lock: Mutex::new(()),
            listener: Mutex::new(Some(listener)),
            listener_stop,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Event bus; subscribe to observe a run directly.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Status of every service of the current or last run, in start order.
    pub async fn snapshot(&self) -> Vec<ServiceStatus> {
        self.states.snapshot().await
    }

    /// State of one service of the current or last run.
    pub async fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.states.state_of(name).await
    }

    /// Delivers events still in flight to the subscribers and stops them.
    ///
    /// Events published afterwards are not delivered to subscribers.
    pub async fn close(&self) {
        self.listener_stop.cancel();
        let handle = self.listener.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Like [`run`](Self::run), cancelled by SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
    pub async fn run_until_signal(&self, registry: Arc<Registry>) -> Result<(), DeploymentError> {
        let token = CancellationToken::new();
        let watcher = {
            let token = token.clone();
            let bus = self.bus.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    res = shutdown::wait_for_shutdown_signal() => match res {
                        Ok(signal) => {
                            bus.publish(Event::new(EventKind::ShutdownRequested).with_reason(signal));
                            token.cancel();
                        }
                        Err(e) => tracing::warn!(error = %e, "cannot listen for shutdown signals"),
                    },
                }
            })
        };

        let res = self.run(registry, token.clone()).await;
        token.cancel();
        let _ = watcher.await;
        res
    }

    /// Brings every service of `registry` up in dependency order.
    ///
    /// Returns `Ok(())` when every service reached Healthy. Otherwise returns the
    /// root failure(s): dependents blocked by a failure are listed inside the
    /// error, not reported separately.
    pub async fn run(
        &self,
        registry: Arc<Registry>,
        token: CancellationToken,
    ) -> Result<(), DeploymentError> {
        let _one_at_a_time = self.run_lock.lock().await;
        self.states.reset(registry.order()).await;

        let gate = DependencyGate::new(self.bus.clone());
        let limit = self.cfg.concurrency_limit();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<Progress>();
        let mut set: JoinSet<(Arc<str>, Outcome)> = JoinSet::new();
        let mut names: HashMap<task::Id, Arc<str>> = HashMap::new();

        let mut run = RunState {
            registry: &*registry,
            position: registry
                .order()
                .into_iter()
                .enumerate()
                .map(|(i, name)| (name, i))
                .collect(),
            scheduled: HashSet::new(),
            healthy: HashSet::new(),
            failed: HashSet::new(),
            started: Arc::new(StartedMap::new()),
            failures: Vec::new(),
        };
        let mut cancelled = token.is_cancelled();

        while !cancelled {
            for spec in registry.iter() {
                if limit.is_some_and(|n| set.len() >= n) {
                    break;
                }
                let name = spec.name();
                if run.scheduled.contains(name) || run.failed.contains(name) {
                    continue;
                }
                if !spec.dependencies().iter().all(|d| run.healthy.contains(d.as_str())) {
                    continue;
                }

                run.scheduled.insert(name);
                self.states.advance(name, ServiceState::Gating).await;
                self.bus
                    .publish(Event::new(EventKind::ServiceGating).with_service(spec.name_arc()));

                let bring_up = BringUp {
                    spec: spec.clone(),
                    registry: Arc::clone(&registry),
                    started: Arc::clone(&run.started),
                    gate: gate.clone(),
                    bus: self.bus.clone(),
                    start_timeout: self.cfg.start_timeout_opt(),
                    progress: progress_tx.clone(),
                };
                let handle = set.spawn(bring_up.run_guarded(token.child_token()));
                names.insert(handle.id(), spec.name_arc());
            }

            if set.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    cancelled = true;
                }
                Some(Progress::Starting(name)) = progress_rx.recv() => {
                    self.states.advance(&name, ServiceState::Starting).await;
                }
                Some(joined) = set.join_next_with_id() => match settle(joined, &mut names) {
                    Some((name, Outcome::Cancelled)) if token.is_cancelled() => {
                        tracing::debug!(service = %name, "bring-up cancelled");
                        cancelled = true;
                    }
                    Some((name, outcome)) => self.apply(&mut run, &name, outcome).await,
                    None => tracing::error!("finished bring-up task has no service"),
                },
            }
        }

        if cancelled {
            set.shutdown().await;
            self.bus.publish(Event::new(EventKind::DeploymentCancelled));
            return Err(DeploymentError::Cancelled);
        }

        let mut failures = run.failures;
        failures.sort_by_key(|(pos, _)| *pos);
        let mut errors: Vec<DeploymentError> = failures.into_iter().map(|(_, e)| e).collect();

        let result = match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(DeploymentError::Multiple(errors)),
        };
        match &result {
            Ok(()) => self.bus.publish(Event::new(EventKind::DeploymentSucceeded)),
            Err(e) => self
                .bus
                .publish(Event::new(EventKind::DeploymentFailed).with_reason(e.to_string())),
        }
        result
    }

    /// Applies the terminal outcome of one bring-up.
    async fn apply<'r>(&self, run: &mut RunState<'r>, name: &str, outcome: Outcome) {
        let registry = run.registry;
        let Some(spec) = registry.get(name) else {
            return;
        };
        let name = spec.name();
        let pos = run.position.get(name).copied().unwrap_or(usize::MAX);

        let (error, attempts, reason) = match outcome {
            Outcome::Healthy { handle, attempts } => {
                self.states.advance(name, ServiceState::Healthy).await;
                self.states.annotate(name, Some(attempts), None).await;
                run.healthy.insert(name);
                Arc::make_mut(&mut run.started).insert(spec.name_arc(), handle);
                self.bus.publish(
                    Event::new(EventKind::ServiceHealthy)
                        .with_service(spec.name_arc())
                        .with_attempt(attempts),
                );
                return;
            }
            Outcome::GateFailed { dependency } => {
                let mut blocked = vec![name.to_string()];
                blocked.extend(registry.downstream(name).into_iter().map(str::to_string));
                let reason = format!("dependency `{dependency}` is unhealthy");
                (
                    DeploymentError::DependencyUnhealthy { dependency, blocked },
                    None,
                    reason,
                )
            }
            Outcome::StartFailed(e) => {
                let reason = e.to_string();
                (
                    DeploymentError::StartFailed {
                        service: name.to_string(),
                        reason: reason.clone(),
                    },
                    None,
                    reason,
                )
            }
            Outcome::Unready { attempts, reason } => {
                let downstream = registry.downstream(name);
                let error = if downstream.is_empty() {
                    DeploymentError::ServiceFailed {
                        service: name.to_string(),
                        attempts,
                        reason: reason.clone(),
                    }
                } else {
                    DeploymentError::DependencyUnhealthy {
                        dependency: name.to_string(),
                        blocked: downstream.into_iter().map(str::to_string).collect(),
                    }
                };
                (error, Some(attempts), reason)
            }
            Outcome::Panicked(info) => {
                let reason = format!("bring-up panicked: {info}");
                (
                    DeploymentError::StartFailed {
                        service: name.to_string(),
                        reason: reason.clone(),
                    },
                    None,
                    reason,
                )
            }
            Outcome::Lost(info) => {
                tracing::error!(service = %name, error = %info, "bring-up task did not complete");
                let reason = format!("bring-up task lost: {info}");
                (
                    DeploymentError::StartFailed {
                        service: name.to_string(),
                        reason: reason.clone(),
                    },
                    None,
                    reason,
                )
            }
            Outcome::Cancelled => (
                DeploymentError::Cancelled,
                None,
                "cancelled".to_string(),
            ),
        };

        self.fail(run, name, attempts, reason).await;
        run.failures.push((pos, error));
    }

    /// Marks `name` Failed and blocks everything downstream of it.
    async fn fail<'r>(
        &self,
        run: &mut RunState<'r>,
        name: &'r str,
        attempts: Option<u32>,
        reason: String,
    ) {
        run.failed.insert(name);
        if self.states.advance(name, ServiceState::Failed).await {
            self.states.annotate(name, attempts, Some(reason.clone())).await;
            let mut ev = Event::new(EventKind::ServiceFailed)
                .with_service(name)
                .with_reason(reason);
            if let Some(n) = attempts {
                ev = ev.with_attempt(n);
            }
            self.bus.publish(ev);
        }

        let registry = run.registry;
        for dependent in registry.downstream(name) {
            run.failed.insert(dependent);
            if self.states.advance(dependent, ServiceState::Failed).await {
                let reason = format!("dependency `{name}` failed");
                self.states
                    .annotate(dependent, None, Some(reason.clone()))
                    .await;
                self.bus.publish(
                    Event::new(EventKind::ServiceBlocked)
                        .with_service(dependent)
                        .with_dependency(name)
                        .with_reason(reason),
                );
            }
        }
    }
}

/// Pairs a finished bring-up task with its service.
///
/// A task that ended without reporting is named through `names` and becomes
/// [`Outcome::Lost`].
fn settle(
    joined: Result<(task::Id, (Arc<str>, Outcome)), JoinError>,
    names: &mut HashMap<task::Id, Arc<str>>,
) -> Option<(Arc<str>, Outcome)> {
    match joined {
        Ok((id, reported)) => {
            names.remove(&id);
            Some(reported)
        }
        Err(e) => {
            let name = names.remove(&e.id())?;
            Some((name, Outcome::Lost(e.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{ProbeError, StartError};
    use crate::probe::{CheckFn, Health, ProbeDefinition};
    use crate::services::{LaunchContext, LaunchFn, ServiceHandle, ServiceSpec};

    fn spec(name: &str) -> ServiceSpec {
        ServiceSpec::new(
            name,
            LaunchFn::arc(|ctx: LaunchContext| async move {
                Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
            }),
            ProbeDefinition::new(
                CheckFn::arc(|_h: ServiceHandle| async { Ok::<_, ProbeError>(Health::Healthy) }),
                Duration::from_secs(1),
                Duration::from_secs(1),
                1,
            ),
        )
    }

    #[tokio::test]
    async fn aborted_bring_up_is_named_and_lost() {
        let mut set: JoinSet<(Arc<str>, Outcome)> = JoinSet::new();
        let mut names = HashMap::new();
        let handle = set.spawn(futures::future::pending());
        names.insert(handle.id(), Arc::<str>::from("db"));
        handle.abort();

        let joined = set.join_next_with_id().await.unwrap();
        let (name, outcome) = settle(joined, &mut names).unwrap();
        assert_eq!(&*name, "db");
        assert!(matches!(outcome, Outcome::Lost(ref info) if info.contains("cancelled")));
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn lost_bring_up_fails_the_service_and_blocks_dependents() {
        let registry = Registry::new(vec![spec("db"), spec("app").depends_on(["db"])]).unwrap();
        let sup = Supervisor::builder(SupervisorConfig::default()).build();
        sup.states.reset(registry.order()).await;

        let mut run = RunState {
            registry: &registry,
            position: registry
                .order()
                .into_iter()
                .enumerate()
                .map(|(i, name)| (name, i))
                .collect(),
            scheduled: HashSet::from(["db"]),
            healthy: HashSet::new(),
            failed: HashSet::new(),
            started: Arc::new(StartedMap::new()),
            failures: Vec::new(),
        };
        sup.apply(&mut run, "db", Outcome::Lost("task 7 was cancelled".into()))
            .await;

        assert_eq!(
            run.failures,
            vec![(
                0,
                DeploymentError::StartFailed {
                    service: "db".into(),
                    reason: "bring-up task lost: task 7 was cancelled".into(),
                }
            )]
        );
        assert!(run.failed.contains("app"));
        assert_eq!(sup.state_of("db").await, Some(ServiceState::Failed));
        assert_eq!(sup.state_of("app").await, Some(ServiceState::Failed));
    }
}
