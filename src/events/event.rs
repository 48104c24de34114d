//! # Runtime events emitted by the supervisor, gates and readiness loops.
//!
//! [`EventKind`] classifies events into:
//! - **Service lifecycle**: gating, starting, started, healthy, failed, blocked
//! - **Probing**: per-attempt results and retry scheduling
//! - **Deployment**: overall outcome and cancellation
//! - **Subscriber health**: overflow and panics of event subscribers
//!
//! The [`Event`] struct carries optional metadata (service, dependency, attempt,
//! delays, reasons) filled in depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use gatevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProbeFailed)
//!     .with_service("app")
//!     .with_dependency("db")
//!     .with_attempt(2)
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::ProbeFailed);
//! assert_eq!(ev.service.as_deref(), Some("app"));
//! assert_eq!(ev.dependency.as_deref(), Some("db"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing (`service`: subscriber name, `reason`: panic message).
    SubscriberPanicked,
    /// Subscriber dropped an event (`service`: subscriber name, `reason`: "full"/"closed").
    SubscriberOverflow,

    // === Deployment events ===
    /// OS termination signal observed; the run is being cancelled.
    ShutdownRequested,
    /// Every service reached Healthy.
    DeploymentSucceeded,
    /// The run finished with at least one failed service (`reason`: error summary).
    DeploymentFailed,
    /// The run was cancelled before finishing.
    DeploymentCancelled,

    // === Service lifecycle ===
    /// Service entered Gating; its dependencies are being probed.
    ServiceGating,
    /// Every dependency of `service` answered healthy.
    GateCleared,
    /// Start directive is about to be invoked.
    ServiceStarting,
    /// Start directive returned a running handle.
    ServiceStarted,
    /// Service passed its own readiness probe (`attempt`: attempts used).
    ServiceHealthy,
    /// Service failed (`reason`: why).
    ServiceFailed,
    /// Service will never start because `dependency` failed.
    ServiceBlocked,

    // === Probing ===
    /// Probe attempt succeeded. `service` is the probed service; `dependency` is set
    /// when the probe runs on behalf of a dependent's gate (then `service` is the dependent).
    ProbeSucceeded,
    /// Probe attempt reported unhealthy (`reason`: check detail).
    ProbeFailed,
    /// Probe attempt exceeded its timeout (`timeout_ms`).
    ProbeTimeout,
    /// Probe could not execute at all (`reason`: infrastructure error).
    ProbeInfrastructureFailure,
    /// Next probe attempt scheduled after `delay_ms`.
    RetryScheduled,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Service the event is about.
    pub service: Option<Arc<str>>,
    /// Dependency involved (gate probes, blocked services).
    pub dependency: Option<Arc<str>>,
    /// Probe attempt number (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds.
    pub delay_ms: Option<u32>,
    /// Probe timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Elapsed time of the attempt in milliseconds.
    pub elapsed_ms: Option<u32>,
    /// Process id of a started service.
    pub pid: Option<u32>,
    /// Human-readable reason (errors, check details).
    pub reason: Option<Arc<str>>,
}

fn clamp_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            dependency: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            elapsed_ms: None,
            pid: None,
            reason: None,
        }
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a dependency name.
    #[inline]
    pub fn with_dependency(mut self, dependency: impl Into<Arc<str>>) -> Self {
        self.dependency = Some(dependency.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches a probe timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(clamp_ms(d));
        self
    }

    /// Attaches an optional process id.
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }
}
