//! # Readiness checks.
//!
//! A [`Check`] answers one question once: is this service instance ready?
//! - `Ok(Health::Healthy)` / `Ok(Health::Unhealthy { .. })` is a health signal;
//! - `Err(ProbeError)` means the check could not run at all.
//!
//! Checks never retry or sleep; the readiness loop owns that policy.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::services::ServiceHandle;

/// Shared readiness check.
pub type CheckRef = Arc<dyn Check>;

/// Answer of a single check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Health {
    /// The service can serve its function.
    Healthy,
    /// The service is not ready yet.
    Unhealthy {
        /// Optional explanation (exit status, connection error, ...).
        detail: Option<String>,
    },
}

impl Health {
    /// Unhealthy with a detail message.
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Health::Unhealthy {
            detail: Some(detail.into()),
        }
    }
}

/// Externally supplied readiness predicate.
#[async_trait]
pub trait Check: Send + Sync + 'static {
    /// Runs the check once against `target`.
    async fn check(&self, target: &ServiceHandle) -> Result<Health, ProbeError>;
}

/// Closure-backed check. The closure receives a clone of the target handle.
///
/// ```rust
/// use gatevisor::{CheckFn, CheckRef, Health, ProbeError, ServiceHandle};
///
/// let always_ready: CheckRef = CheckFn::arc(|_target: ServiceHandle| async {
///     Ok::<_, ProbeError>(Health::Healthy)
/// });
/// ```
pub struct CheckFn<F> {
    f: F,
}

impl<F> CheckFn<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps `f` and returns it as an `Arc`.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Check for CheckFn<F>
where
    F: Fn(ServiceHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Health, ProbeError>> + Send + 'static,
{
    async fn check(&self, target: &ServiceHandle) -> Result<Health, ProbeError> {
        (self.f)(target.clone()).await
    }
}
