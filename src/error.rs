//! Error types used by the launcher.
//!
//! - [`SpecError`]: the service declaration is invalid (reported before anything starts).
//! - [`ProbeError`]: the probing mechanism itself could not run.
//! - [`StartError`]: a start directive failed.
//! - [`GateError`]: a dependency gate could not be cleared.
//! - [`DeploymentError`]: aggregate outcome of [`Supervisor::run`](crate::Supervisor::run).
//!
//! Every type provides `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Declaration-time errors.
///
/// Raised while loading a manifest or building a [`Registry`](crate::Registry).
/// No service is ever started when one of these is returned.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// Service name is empty.
    #[error("service name must not be empty")]
    EmptyName,

    /// Two services share the same name.
    #[error("service `{name}` is declared more than once")]
    DuplicateService {
        /// The duplicated name.
        name: String,
    },

    /// A service depends on a name that is not declared.
    #[error("service `{service}` depends on unknown service `{dependency}`")]
    UnknownDependency {
        /// Declaring service.
        service: String,
        /// Dangling reference.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Names along the cycle; the first name is repeated at the end.
        cycle: Vec<String>,
    },

    /// A required probe field is absent.
    #[error("service `{service}`: probe field `{field}` is required")]
    MissingProbeField {
        /// Declaring service.
        service: String,
        /// Name of the missing field.
        field: &'static str,
    },

    /// Probe parameters are out of range (non-positive interval/timeout, bad backoff).
    #[error("service `{service}`: invalid probe: {reason}")]
    InvalidProbe {
        /// Declaring service.
        service: String,
        /// What is wrong.
        reason: String,
    },

    /// The start section does not describe exactly one way to launch the service.
    #[error("service `{service}`: invalid start directive: {reason}")]
    InvalidStart {
        /// Declaring service.
        service: String,
        /// What is wrong.
        reason: String,
    },

    /// The manifest could not be read.
    #[error("cannot read manifest {path}: {reason}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error message.
        reason: String,
    },

    /// The manifest is not a valid document.
    #[error("malformed manifest: {reason}")]
    Parse {
        /// Parser message.
        reason: String,
    },
}

impl SpecError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gatevisor::SpecError;
    ///
    /// let err = SpecError::CyclicDependency { cycle: vec!["a".into(), "b".into(), "a".into()] };
    /// assert_eq!(err.as_label(), "spec_cyclic_dependency");
    /// assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SpecError::EmptyName => "spec_empty_name",
            SpecError::DuplicateService { .. } => "spec_duplicate_service",
            SpecError::UnknownDependency { .. } => "spec_unknown_dependency",
            SpecError::CyclicDependency { .. } => "spec_cyclic_dependency",
            SpecError::MissingProbeField { .. } => "spec_missing_probe_field",
            SpecError::InvalidProbe { .. } => "spec_invalid_probe",
            SpecError::InvalidStart { .. } => "spec_invalid_start",
            SpecError::Read { .. } => "spec_read",
            SpecError::Parse { .. } => "spec_parse",
        }
    }
}

/// # Probe infrastructure failures.
///
/// Distinct from a negative health signal: the check could not be executed at all.
/// The readiness loop counts it as a failed attempt.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The probe program could not be spawned.
    #[error("cannot spawn probe `{program}`: {reason}")]
    Spawn {
        /// Program that was attempted.
        program: String,
        /// OS error message.
        reason: String,
    },

    /// Any other failure of the probing mechanism.
    #[error("probe unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },
}

impl ProbeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProbeError::Spawn { .. } => "probe_spawn",
            ProbeError::Unavailable { .. } => "probe_unavailable",
        }
    }
}

/// # Start directive failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    /// The program could not be spawned.
    #[error("cannot spawn `{program}`: {reason}")]
    Spawn {
        /// Program that was attempted.
        program: String,
        /// OS error message.
        reason: String,
    },

    /// The start directive did not return a handle in time.
    #[error("start timed out after {timeout:?}")]
    Timeout {
        /// Configured start timeout.
        timeout: Duration,
    },

    /// The start directive reported a failure.
    #[error("start failed: {reason}")]
    Failed {
        /// Reported reason.
        reason: String,
    },
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::Spawn { .. } => "start_spawn",
            StartError::Timeout { .. } => "start_timeout",
            StartError::Failed { .. } => "start_failed",
        }
    }
}

/// # Dependency gate failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The named dependency did not become healthy within its retry budget,
    /// or is not running at all.
    #[error("dependency `{0}` is unhealthy")]
    DependencyUnhealthy(String),

    /// The gate was abandoned because the run was cancelled.
    #[error("gate cancelled")]
    Cancelled,
}

impl GateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GateError::DependencyUnhealthy(_) => "gate_dependency_unhealthy",
            GateError::Cancelled => "gate_cancelled",
        }
    }
}

/// # Aggregate deployment errors.
///
/// Returned by [`Supervisor::run`](crate::Supervisor::run). A single root failure
/// is returned as its own variant; several independent root failures are
/// collected into [`DeploymentError::Multiple`] (in topological order).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeploymentError {
    /// The declaration is invalid; nothing was started.
    #[error("invalid spec: {0}")]
    InvalidSpec(#[from] SpecError),

    /// `dependency` never became healthy; `blocked` lists the services that were
    /// not started because of it.
    #[error("dependency `{dependency}` is unhealthy; not started: {blocked:?}")]
    DependencyUnhealthy {
        /// Unhealthy dependency.
        dependency: String,
        /// Services that were never started because of it.
        blocked: Vec<String>,
    },

    /// A service with no dependents was started but never became healthy.
    #[error("service `{service}` failed after {attempts} probe attempt(s): {reason}")]
    ServiceFailed {
        /// Failed service.
        service: String,
        /// Readiness attempts made.
        attempts: u32,
        /// Last failure detail.
        reason: String,
    },

    /// The start directive of `service` failed.
    #[error("service `{service}` failed to start: {reason}")]
    StartFailed {
        /// Failed service.
        service: String,
        /// Start error message.
        reason: String,
    },

    /// The run was cancelled externally.
    #[error("deployment cancelled")]
    Cancelled,

    /// Several independent branches failed.
    #[error("{} services failed: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<DeploymentError>),
}

impl DeploymentError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use gatevisor::DeploymentError;
    ///
    /// let err = DeploymentError::DependencyUnhealthy { dependency: "db".into(), blocked: vec!["app".into()] };
    /// assert_eq!(err.as_label(), "deployment_dependency_unhealthy");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DeploymentError::InvalidSpec(_) => "deployment_invalid_spec",
            DeploymentError::DependencyUnhealthy { .. } => "deployment_dependency_unhealthy",
            DeploymentError::ServiceFailed { .. } => "deployment_service_failed",
            DeploymentError::StartFailed { .. } => "deployment_start_failed",
            DeploymentError::Cancelled => "deployment_cancelled",
            DeploymentError::Multiple(_) => "deployment_multiple",
        }
    }

    /// Returns the names of the services that failed at the root (not the blocked ones).
    pub fn failed_services(&self) -> Vec<&str> {
        match self {
            DeploymentError::DependencyUnhealthy { dependency, .. } => vec![dependency.as_str()],
            DeploymentError::ServiceFailed { service, .. }
            | DeploymentError::StartFailed { service, .. } => vec![service.as_str()],
            DeploymentError::Multiple(all) => all.iter().flat_map(|e| e.failed_services()).collect(),
            DeploymentError::InvalidSpec(_) | DeploymentError::Cancelled => Vec::new(),
        }
    }
}

fn join_errors(errors: &[DeploymentError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
