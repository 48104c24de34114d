//! # Readiness loop.
//!
//! Repeats [`probe`] against one service until it answers healthy or the retry
//! budget of its [`ProbeDefinition`] is spent. Used both for a service's own
//! post-start readiness and by the dependency gate on behalf of a dependent.
//!
//! ```text
//! attempt = 1
//! loop {
//!   probe(def, handle, attempt) ─► Success        → Ok(attempt)
//!                               ├► Failure/Timeout ┐
//!                               └► ProbeError      ┘ (consumes a retry)
//!   attempt > retries?  → Err(Exhausted)
//!   sleep(backoff.next(attempt - 1))  (cancellable) → RetryScheduled
//!   attempt += 1
//! }
//! ```
//!
//! Cancellation of `token` aborts the in-flight attempt or sleep and yields
//! [`Unready::Cancelled`]. Nothing here touches service state: the caller decides.

use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::probe::definition::ProbeDefinition;
use crate::probe::health::{probe, ProbeOutcome};
use crate::services::ServiceHandle;

/// Why a readiness wait ended without a healthy answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Unready {
    /// Every allowed attempt failed.
    Exhausted { attempts: u32, last: String },
    /// The wait was cancelled.
    Cancelled,
}

/// Who the probe events are attributed to.
#[derive(Clone, Debug)]
pub(crate) struct ProbeSubject {
    service: Arc<str>,
    dependent: Option<Arc<str>>,
}

impl ProbeSubject {
    /// Own readiness of `service`.
    pub(crate) fn own(service: Arc<str>) -> Self {
        Self {
            service,
            dependent: None,
        }
    }

    /// Readiness of `dependency` checked by the gate of `dependent`.
    pub(crate) fn dependency_of(dependency: Arc<str>, dependent: Arc<str>) -> Self {
        Self {
            service: dependency,
            dependent: Some(dependent),
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        match &self.dependent {
            Some(dependent) => Event::new(kind)
                .with_service(dependent.clone())
                .with_dependency(self.service.clone()),
            None => Event::new(kind).with_service(self.service.clone()),
        }
    }
}

/// Probes until healthy. Returns the number of attempts used.
pub(crate) async fn wait_until_healthy(
    subject: &ProbeSubject,
    def: &ProbeDefinition,
    handle: &ServiceHandle,
    token: &CancellationToken,
    bus: &Bus,
) -> Result<u32, Unready> {
    let backoff = def.backoff();
    let mut attempt: u32 = 0;

    loop {
        if token.is_cancelled() {
            return Err(Unready::Cancelled);
        }
        attempt = attempt.saturating_add(1);

        let res = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Unready::Cancelled),
            res = probe(def, handle, attempt) => res,
        };

        let last = match res {
            Ok(r) if r.is_success() => {
                bus.publish(
                    subject
                        .event(EventKind::ProbeSucceeded)
                        .with_attempt(attempt)
                        .with_elapsed(r.elapsed),
                );
                return Ok(attempt);
            }
            Ok(r) => {
                let detail = r.failure_detail().unwrap_or_default();
                let ev = match r.outcome {
                    ProbeOutcome::Timeout { after } => {
                        subject.event(EventKind::ProbeTimeout).with_timeout(after)
                    }
                    _ => subject.event(EventKind::ProbeFailed),
                };
                bus.publish(
                    ev.with_attempt(attempt)
                        .with_elapsed(r.elapsed)
                        .with_reason(detail.as_str()),
                );
                detail
            }
            Err(e) => {
                let detail = e.to_string();
                bus.publish(
                    subject
                        .event(EventKind::ProbeInfrastructureFailure)
                        .with_attempt(attempt)
                        .with_reason(detail.as_str()),
                );
                detail
            }
        };

        if attempt > def.retries() {
            return Err(Unready::Exhausted {
                attempts: attempt,
                last,
            });
        }

        let delay = backoff.next(attempt - 1);
        bus.publish(
            subject
                .event(EventKind::RetryScheduled)
                .with_attempt(attempt)
                .with_delay(delay),
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Unready::Cancelled),
            _ = time::sleep(delay) => {}
        }
    }
}
