//! # Service declaration.
//!
//! [`ServiceSpec`] bundles everything the supervisor needs to bring one service up:
//! - its unique name,
//! - the start directive ([`LaunchRef`]),
//! - the readiness probe ([`ProbeDefinition`]),
//! - the names it depends on (ordered, duplicates removed),
//! - environment bindings injected at start.
//!
//! Specs are validated as a set by [`Registry::new`](crate::Registry::new) and are
//! immutable once registered.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use gatevisor::{CheckFn, Health, LaunchFn, ProbeDefinition, ProbeError, ServiceHandle, ServiceSpec, StartError};
//!
//! let probe = ProbeDefinition::new(
//!     CheckFn::arc(|_h: ServiceHandle| async { Ok::<_, ProbeError>(Health::Healthy) }),
//!     Duration::from_secs(1),
//!     Duration::from_secs(1),
//!     3,
//! );
//! let launch = LaunchFn::arc(|ctx: gatevisor::LaunchContext| async move {
//!     Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
//! });
//!
//! let app = ServiceSpec::new("app", launch, probe)
//!     .depends_on(["db", "cache", "db"])
//!     .with_env("DATABASE_URL", "postgres://db/santa");
//!
//! assert_eq!(app.dependencies(), ["db".to_string(), "cache".to_string()]);
//! assert_eq!(app.environment()["DATABASE_URL"], "postgres://db/santa");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::probe::ProbeDefinition;
use crate::services::launch::LaunchRef;

/// Static declaration of one service.
#[derive(Clone)]
pub struct ServiceSpec {
    name: Arc<str>,
    launch: LaunchRef,
    probe: ProbeDefinition,
    depends_on: Vec<String>,
    environment: Arc<BTreeMap<String, String>>,
}

impl ServiceSpec {
    /// Declares a service with no dependencies and no environment.
    pub fn new(name: impl Into<Arc<str>>, launch: LaunchRef, probe: ProbeDefinition) -> Self {
        Self {
            name: name.into(),
            launch,
            probe,
            depends_on: Vec::new(),
            environment: Arc::new(BTreeMap::new()),
        }
    }

    /// Adds dependencies, keeping first-seen order and dropping repeats.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dep in deps {
            let dep = dep.into();
            if !self.depends_on.contains(&dep) {
                self.depends_on.push(dep);
            }
        }
        self
    }

    /// Adds one environment binding.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.environment).insert(key.into(), value.into());
        self
    }

    /// Replaces all environment bindings.
    pub fn with_environment(mut self, env: BTreeMap<String, String>) -> Self {
        self.environment = Arc::new(env);
        self
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Start directive.
    pub fn launch(&self) -> &LaunchRef {
        &self.launch
    }

    /// Readiness probe.
    pub fn probe(&self) -> &ProbeDefinition {
        &self.probe
    }

    /// Declared dependencies in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    /// Environment bindings.
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub(crate) fn environment_arc(&self) -> Arc<BTreeMap<String, String>> {
        Arc::clone(&self.environment)
    }
}

impl fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSpec")
            .field("name", &self.name)
            .field("probe", &self.probe)
            .field("depends_on", &self.depends_on)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}
