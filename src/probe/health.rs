//! # Single probe attempt.
//!
//! [`probe`] runs a definition's check exactly once against a target, bounded by
//! the definition's timeout, and reports a fresh [`ProbeResult`].
//!
//! ```text
//! probe(def, target, attempt)
//!   ├─ check → Ok(Healthy)          → ProbeResult { outcome: Success }
//!   ├─ check → Ok(Unhealthy{detail}) → ProbeResult { outcome: Failure{detail} }
//!   ├─ timeout elapsed               → ProbeResult { outcome: Timeout }  (check future dropped)
//!   └─ check → Err(ProbeError)       → Err(ProbeError)                 (infrastructure)
//! ```
//!
//! No retries, no sleeping: that belongs to the readiness loop.

use std::time::Duration;

use tokio::time::{self, Instant};

use crate::error::ProbeError;
use crate::probe::check::Health;
use crate::probe::definition::ProbeDefinition;
use crate::services::ServiceHandle;

/// Outcome of one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The check reported healthy.
    Success,
    /// The check reported unhealthy.
    Failure {
        /// Detail returned by the check.
        detail: Option<String>,
    },
    /// The check did not answer within the timeout.
    Timeout {
        /// The timeout that was exceeded.
        after: Duration,
    },
}

/// Result of one probe invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    /// What the check said.
    pub outcome: ProbeOutcome,
    /// Attempt number (1-based) within the current readiness wait.
    pub attempt: u32,
    /// Time spent in the attempt.
    pub elapsed: Duration,
}

impl ProbeResult {
    /// True for [`ProbeOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Success)
    }

    /// Human-readable failure description, `None` on success.
    pub fn failure_detail(&self) -> Option<String> {
        match &self.outcome {
            ProbeOutcome::Success => None,
            ProbeOutcome::Failure { detail } => {
                Some(detail.clone().unwrap_or_else(|| "unhealthy".to_string()))
            }
            ProbeOutcome::Timeout { after } => Some(format!("timed out after {after:?}")),
        }
    }
}

/// Executes the check of `def` once against `target`.
pub async fn probe(
    def: &ProbeDefinition,
    target: &ServiceHandle,
    attempt: u32,
) -> Result<ProbeResult, ProbeError> {
    let started = Instant::now();
    let timeout = def.timeout();

    let outcome = match time::timeout(timeout, def.check().check(target)).await {
        Ok(Ok(Health::Healthy)) => ProbeOutcome::Success,
        Ok(Ok(Health::Unhealthy { detail })) => ProbeOutcome::Failure { detail },
        Ok(Err(e)) => return Err(e),
        Err(_elapsed) => ProbeOutcome::Timeout { after: timeout },
    };

    Ok(ProbeResult {
        outcome,
        attempt,
        elapsed: started.elapsed(),
    })
}
