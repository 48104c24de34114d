//! # Per-service state table.
//!
//! Tracks the [`ServiceState`] of every service in the current (or last) run.
//!
//! ```text
//! Pending ──► Gating ──► Starting ──► Healthy
//!    │           │           │
//!    └───────────┴───────────┴──────► Failed
//! ```
//!
//! ## Rules
//! - Only the supervisor loop writes; readers get eventually consistent snapshots.
//! - Transitions only move forward; `Healthy` and `Failed` are terminal.
//! - A rejected transition leaves the entry untouched.

use std::fmt;

use tokio::sync::RwLock;

/// Lifecycle state of one service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Not processed yet.
    Pending,
    /// Dependencies are being probed.
    Gating,
    /// Start directive invoked; own readiness not confirmed yet.
    Starting,
    /// Started and answered its own readiness probe.
    Healthy,
    /// Gave up on this service (gate, start or readiness failure, or a failed dependency).
    Failed,
}

impl ServiceState {
    fn rank(self) -> u8 {
        match self {
            ServiceState::Pending => 0,
            ServiceState::Gating => 1,
            ServiceState::Starting => 2,
            ServiceState::Healthy | ServiceState::Failed => 3,
        }
    }

    /// True for `Healthy` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ServiceState::Healthy | ServiceState::Failed)
    }

    /// True if moving from `self` to `next` goes forward.
    pub fn can_advance_to(self, next: ServiceState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            ServiceState::Failed => true,
            _ => next.rank() > self.rank(),
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Pending => "pending",
            ServiceState::Gating => "gating",
            ServiceState::Starting => "starting",
            ServiceState::Healthy => "healthy",
            ServiceState::Failed => "failed",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Service name.
    pub name: String,
    /// Current state.
    pub state: ServiceState,
    /// Own readiness attempts used, once known.
    pub attempts: Option<u32>,
    /// Why the service failed, if it did.
    pub reason: Option<String>,
}

/// State of every service, in start order.
#[derive(Debug, Default)]
pub(crate) struct StateTable {
    entries: RwLock<Vec<ServiceStatus>>,
}

impl StateTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replaces the table with `names`, all Pending.
    pub(crate) async fn reset<'a>(&self, names: impl IntoIterator<Item = &'a str>) {
        let fresh = names
            .into_iter()
            .map(|name| ServiceStatus {
                name: name.to_string(),
                state: ServiceState::Pending,
                attempts: None,
                reason: None,
            })
            .collect();
        *self.entries.write().await = fresh;
    }

    /// Moves `name` to `next` if that goes forward. Returns whether it did.
    pub(crate) async fn advance(&self, name: &str, next: ServiceState) -> bool {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.name == name) {
            Some(entry) if entry.state.can_advance_to(next) => {
                entry.state = next;
                true
            }
            _ => false,
        }
    }

    /// Records readiness attempts and/or a failure reason for `name`.
    pub(crate) async fn annotate(&self, name: &str, attempts: Option<u32>, reason: Option<String>) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.name == name) {
            if attempts.is_some() {
                entry.attempts = attempts;
            }
            if reason.is_some() {
                entry.reason = reason;
            }
        }
    }

    /// Current state of `name`.
    pub(crate) async fn state_of(&self, name: &str) -> Option<ServiceState> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.state)
    }

    /// Copy of all entries.
    pub(crate) async fn snapshot(&self) -> Vec<ServiceStatus> {
        self.entries.read().await.clone()
    }
}
