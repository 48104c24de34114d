//! # LogWriter: events rendered through `tracing`
//!
//! Emits one structured log line per event. Failures go to `warn`/`error`,
//! lifecycle milestones to `info`, per-attempt noise to `debug`.
//!
//! ## Example output (compact formatter)
//! ```text
//! INFO gating service=app
//! DEBUG probe failed service=db attempt=1 reason=exit status: 1
//! DEBUG retry scheduled service=db attempt=1 delay_ms=5000
//! INFO service healthy service=db attempts=3
//! INFO service started service=app pid=4242
//! WARN service blocked service=app dependency=db
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every event with `tracing`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("-");
        let dependency = e.dependency.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::ServiceGating => info!(service, "gating"),
            EventKind::GateCleared => info!(service, "gate cleared"),
            EventKind::ServiceStarting => info!(service, "starting"),
            EventKind::ServiceStarted => info!(service, pid = ?e.pid, "service started"),
            EventKind::ServiceHealthy => {
                info!(service, attempts = ?e.attempt, "service healthy")
            }
            EventKind::ServiceFailed => error!(service, reason, "service failed"),
            EventKind::ServiceBlocked => warn!(service, dependency, "service blocked"),
            EventKind::ProbeSucceeded => debug!(
                service,
                dependency,
                attempt = ?e.attempt,
                elapsed_ms = ?e.elapsed_ms,
                "probe succeeded"
            ),
            EventKind::ProbeFailed => debug!(
                service,
                dependency,
                attempt = ?e.attempt,
                reason,
                "probe failed"
            ),
            EventKind::ProbeTimeout => debug!(
                service,
                dependency,
                attempt = ?e.attempt,
                timeout_ms = ?e.timeout_ms,
                "probe timed out"
            ),
            EventKind::ProbeInfrastructureFailure => warn!(
                service,
                dependency,
                attempt = ?e.attempt,
                reason,
                "probe could not run"
            ),
            EventKind::RetryScheduled => debug!(
                service,
                dependency,
                attempt = ?e.attempt,
                delay_ms = ?e.delay_ms,
                "retry scheduled"
            ),
            EventKind::DeploymentSucceeded => info!("deployment succeeded"),
            EventKind::DeploymentFailed => error!(reason, "deployment failed"),
            EventKind::DeploymentCancelled => warn!("deployment cancelled"),
            EventKind::ShutdownRequested => warn!(signal = reason, "shutdown requested"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = service, reason, "subscriber dropped event")
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = service, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
