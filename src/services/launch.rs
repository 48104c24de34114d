//! # Start directives.
//!
//! [`Launch`] is the opaque start action of a service. The supervisor calls it
//! once, after the service's dependency gate cleared, with the environment
//! bindings declared for the service. It returns a [`ServiceHandle`] or a
//! [`StartError`].
//!
//! [`LaunchFn`] wraps a closure; [`CommandLauncher`](crate::CommandLauncher)
//! spawns a local process.
//!
//! ## Example
//! ```rust
//! use gatevisor::{LaunchContext, LaunchFn, LaunchRef, ServiceHandle, StartError};
//!
//! let launch: LaunchRef = LaunchFn::arc(|ctx: LaunchContext| async move {
//!     assert_eq!(ctx.env("MODE"), Some("test"));
//!     Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
//! });
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StartError;
use crate::services::handle::ServiceHandle;

/// Shared start directive.
pub type LaunchRef = Arc<dyn Launch>;

/// Everything a start directive receives.
#[derive(Clone, Debug)]
pub struct LaunchContext {
    service: Arc<str>,
    environment: Arc<BTreeMap<String, String>>,
}

impl LaunchContext {
    pub(crate) fn new(service: Arc<str>, environment: Arc<BTreeMap<String, String>>) -> Self {
        Self {
            service,
            environment,
        }
    }

    /// Name of the service being started.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Environment bindings to inject.
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Single binding lookup.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }
}

/// Externally supplied start action.
#[async_trait]
pub trait Launch: Send + Sync + 'static {
    /// Starts the service and returns a handle to the running instance.
    async fn launch(&self, ctx: LaunchContext) -> Result<ServiceHandle, StartError>;
}

/// Closure-backed start directive.
pub struct LaunchFn<F> {
    f: F,
}

impl<F> LaunchFn<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps `f` and returns it as a [`LaunchRef`]-compatible `Arc`.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Launch for LaunchFn<F>
where
    F: Fn(LaunchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ServiceHandle, StartError>> + Send + 'static,
{
    async fn launch(&self, ctx: LaunchContext) -> Result<ServiceHandle, StartError> {
        (self.f)(ctx).await
    }
}
