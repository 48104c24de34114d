//! # YAML manifests.
//!
//! A [`Manifest`] is the declarative description of a deployment unit. It is
//! parsed with `serde_yaml`, then turned into a validated [`Registry`] whose
//! services are started with [`CommandLauncher`] and probed with
//! [`CommandCheck`] or [`TcpCheck`].
//!
//! ```yaml
//! services:
//!   - name: db
//!     start:
//!       command: ["postgres", "-D", "/var/lib/postgres"]
//!     environment:
//!       POSTGRES_USER: santa
//!     probe:
//!       command: ["pg_isready", "-U", "santa"]
//!       interval: 5s
//!       timeout: 5s
//!       retries: 5
//!   - name: app
//!     start:
//!       shell: "uvicorn main:app --port 8000"
//!     depends_on: [db]
//!     probe:
//!       tcp: "127.0.0.1:8000"
//!       interval: 1s
//!       timeout: 1s
//!       retries: 10
//! ```
//!
//! Unknown keys are rejected everywhere. All problems are reported as
//! [`SpecError`] before anything is started.

mod duration;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::SpecError;
use crate::policies::JitterPolicy;
use crate::probe::{CheckRef, CommandCheck, ProbeDefinition, TcpCheck};
use crate::process::CommandLine;
use crate::registry::Registry;
use crate::services::{CommandLauncher, ServiceSpec};

pub use duration::{parse_duration, DurationValue};

/// Top-level document.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Declared services.
    pub services: Vec<ServiceDecl>,
}

/// One service entry.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDecl {
    /// Unique name.
    pub name: String,
    /// How to start it.
    pub start: StartDecl,
    /// Environment bindings injected at start.
    #[serde(default)]
    pub environment: BTreeMap<String, EnvValue>,
    /// Readiness probe (required).
    #[serde(default)]
    pub probe: Option<ProbeDecl>,
    /// Names of the services this one depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Start section: exactly one of `command` / `shell`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartDecl {
    /// Program and arguments.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Script for `sh -c`.
    #[serde(default)]
    pub shell: Option<String>,
    /// Working directory.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

/// Probe section: exactly one of `command` / `shell` / `tcp`, plus timing.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeDecl {
    /// Program and arguments; exit 0 means healthy.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Script for `sh -c`; exit 0 means healthy.
    #[serde(default)]
    pub shell: Option<String>,
    /// `host:port` that must accept a TCP connection.
    #[serde(default)]
    pub tcp: Option<String>,
    /// Delay between attempts.
    #[serde(default)]
    pub interval: Option<DurationValue>,
    /// Per-attempt timeout.
    #[serde(default)]
    pub timeout: Option<DurationValue>,
    /// Failed attempts tolerated after the first.
    #[serde(default)]
    pub retries: Option<u32>,
    /// Interval growth factor (default 1.0).
    #[serde(default)]
    pub backoff_factor: Option<f64>,
    /// Cap on the grown interval.
    #[serde(default)]
    pub max_interval: Option<DurationValue>,
    /// Randomization of the interval.
    #[serde(default)]
    pub jitter: Option<JitterPolicy>,
}

/// Scalar environment value; numbers and booleans are rendered as text.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    /// Text.
    Text(String),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Text(s) => f.write_str(s),
            EnvValue::Int(n) => write!(f, "{n}"),
            EnvValue::Float(x) => write!(f, "{x}"),
            EnvValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Manifest {
    /// Parses a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, SpecError> {
        serde_yaml::from_str(text).map_err(|e| SpecError::Parse {
            reason: e.to_string(),
        })
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SpecError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Builds the service specs and validates them as a [`Registry`].
    pub fn into_registry(self) -> Result<Registry, SpecError> {
        let specs = self
            .services
            .into_iter()
            .map(ServiceDecl::into_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Registry::new(specs)
    }
}

/// Loads `path` and returns the validated registry.
pub fn load_registry(path: impl AsRef<Path>) -> Result<Registry, SpecError> {
    Manifest::load(path)?.into_registry()
}

impl ServiceDecl {
    fn into_spec(self) -> Result<ServiceSpec, SpecError> {
        let name = self.name;
        let launcher = self.start.into_launcher(&name)?;
        let probe = self
            .probe
            .ok_or_else(|| missing(&name, "probe"))?
            .into_definition(&name)?;
        let environment = self
            .environment
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();

        Ok(ServiceSpec::new(name, Arc::new(launcher), probe)
            .depends_on(self.depends_on)
            .with_environment(environment))
    }
}

impl StartDecl {
    fn into_launcher(self, service: &str) -> Result<CommandLauncher, SpecError> {
        let invalid = |reason: &str| SpecError::InvalidStart {
            service: service.to_string(),
            reason: reason.to_string(),
        };
        let line = match (self.command, self.shell) {
            (Some(argv), None) => CommandLine::Exec(argv),
            (None, Some(script)) => CommandLine::Shell(script),
            (Some(_), Some(_)) => return Err(invalid("set either `command` or `shell`, not both")),
            (None, None) => return Err(invalid("one of `command` or `shell` is required")),
        };
        if line.is_empty() {
            return Err(invalid("command is empty"));
        }

        let launcher = CommandLauncher::new(line);
        Ok(match self.workdir {
            Some(dir) => launcher.with_workdir(dir),
            None => launcher,
        })
    }
}

impl ProbeDecl {
    fn into_definition(self, service: &str) -> Result<ProbeDefinition, SpecError> {
        let invalid = |reason: String| SpecError::InvalidProbe {
            service: service.to_string(),
            reason,
        };
        let duration = |field: &'static str,
                        value: Option<DurationValue>|
         -> Result<Duration, SpecError> {
            value
                .ok_or_else(|| missing(service, field))?
                .to_duration()
                .map_err(|e| invalid(format!("{field}: {e}")))
        };

        let kinds = [self.command.is_some(), self.shell.is_some(), self.tcp.is_some()];
        let check: CheckRef = match (self.command, self.shell, self.tcp) {
            _ if kinds.iter().filter(|set| **set).count() > 1 => {
                return Err(invalid(
                    "set exactly one of `command`, `shell` or `tcp`".to_string(),
                ))
            }
            (Some(argv), _, _) => Arc::new(CommandCheck::new(non_empty(
                CommandLine::Exec(argv),
                &invalid,
            )?)),
            (_, Some(script), _) => Arc::new(CommandCheck::new(non_empty(
                CommandLine::Shell(script),
                &invalid,
            )?)),
            (_, _, Some(addr)) if addr.trim().is_empty() => {
                return Err(invalid("tcp address is empty".to_string()))
            }
            (_, _, Some(addr)) => Arc::new(TcpCheck::new(addr)),
            (None, None, None) => return Err(missing(service, "command|shell|tcp")),
        };

        let interval = duration("interval", self.interval)?;
        let timeout = duration("timeout", self.timeout)?;
        let retries = self.retries.ok_or_else(|| missing(service, "retries"))?;

        let mut def = ProbeDefinition::new(check, interval, timeout, retries);
        if let Some(factor) = self.backoff_factor {
            def = def.with_backoff_factor(factor);
        }
        if let Some(max) = self.max_interval {
            let max = max
                .to_duration()
                .map_err(|e| invalid(format!("max_interval: {e}")))?;
            def = def.with_max_interval(max);
        }
        if let Some(jitter) = self.jitter {
            def = def.with_jitter(jitter);
        }
        Ok(def)
    }
}

fn missing(service: &str, field: &'static str) -> SpecError {
    SpecError::MissingProbeField {
        service: service.to_string(),
        field,
    }
}

fn non_empty(
    line: CommandLine,
    invalid: &impl Fn(String) -> SpecError,
) -> Result<CommandLine, SpecError> {
    if line.is_empty() {
        return Err(invalid("probe command is empty".to_string()));
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SERVICES: &str = r#"
services:
  - name: app
    start:
      shell: "uvicorn main:app --port 8000"
    depends_on: [db]
    environment:
      DATABASE_URL: postgres://santa@db/santa
      WORKERS: 4
      DEBUG: false
    probe:
      tcp: "127.0.0.1:8000"
      interval: 1s
      timeout: 500
      retries: 10
  - name: db
    start:
      command: ["postgres", "-D", "/var/lib/postgres"]
      workdir: /srv
    probe:
      command: ["pg_isready", "-U", "santa"]
      interval: 5s
      timeout: 5s
      retries: 5
      backoff_factor: 2.0
      max_interval: 1m
      jitter: equal
"#;

    #[test]
    fn builds_registry_in_dependency_order() {
        let registry = Manifest::from_yaml_str(TWO_SERVICES)
            .unwrap()
            .into_registry()
            .unwrap();
        assert_eq!(registry.order(), ["db", "app"]);

        let app = registry.get("app").unwrap();
        assert_eq!(app.dependencies(), ["db".to_string()]);
        assert_eq!(app.environment()["WORKERS"], "4");
        assert_eq!(app.environment()["DEBUG"], "false");
        assert_eq!(app.probe().timeout(), Duration::from_millis(500));
        assert_eq!(app.probe().retries(), 10);

        let db = registry.get("db").unwrap();
        assert_eq!(db.probe().interval(), Duration::from_secs(5));
        assert_eq!(db.probe().max_attempts(), 6);
        assert_eq!(db.probe().backoff().max, Duration::from_secs(60));
        assert_eq!(db.probe().backoff().jitter, JitterPolicy::Equal);
    }

    #[test]
    fn missing_probe_fields_are_named() {
        let doc = r#"
services:
  - name: db
    start: { command: ["postgres"] }
    probe: { command: ["pg_isready"], interval: 5s, timeout: 5s }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(
            err,
            SpecError::MissingProbeField {
                service: "db".into(),
                field: "retries"
            }
        );

        let doc = r#"
services:
  - name: db
    start: { command: ["postgres"] }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(
            err,
            SpecError::MissingProbeField {
                service: "db".into(),
                field: "probe"
            }
        );

        let doc = r#"
services:
  - name: db
    start: { command: ["postgres"] }
    probe: { interval: 5s, timeout: 5s, retries: 1 }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(err.as_label(), "spec_missing_probe_field");
    }

    #[test]
    fn non_positive_timings_are_rejected() {
        let doc = r#"
services:
  - name: db
    start: { command: ["postgres"] }
    probe: { tcp: "127.0.0.1:5432", interval: 0s, timeout: 1s, retries: 1 }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(err.as_label(), "spec_invalid_probe");

        let doc = r#"
services:
  - name: db
    start: { command: ["postgres"] }
    probe: { tcp: "127.0.0.1:5432", interval: 1s, timeout: -5, retries: 1 }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(err.as_label(), "spec_invalid_probe");
    }

    #[test]
    fn ambiguous_sections_are_rejected() {
        let doc = r#"
services:
  - name: db
    start: { command: ["postgres"], shell: "postgres" }
    probe: { tcp: "127.0.0.1:5432", interval: 1s, timeout: 1s, retries: 1 }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(err.as_label(), "spec_invalid_start");

        let doc = r#"
services:
  - name: db
    start: { command: ["postgres"] }
    probe: { tcp: "127.0.0.1:5432", shell: "true", interval: 1s, timeout: 1s, retries: 1 }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(err.as_label(), "spec_invalid_probe");
    }

    #[test]
    fn unknown_keys_and_graph_errors() {
        let err = Manifest::from_yaml_str("services:\n  - name: db\n    image: postgres\n").unwrap_err();
        assert_eq!(err.as_label(), "spec_parse");

        let doc = r#"
services:
  - name: a
    start: { shell: "true" }
    depends_on: [b]
    probe: { shell: "true", interval: 1s, timeout: 1s, retries: 0 }
  - name: b
    start: { shell: "true" }
    depends_on: [a]
    probe: { shell: "true", interval: 1s, timeout: 1s, retries: 0 }
"#;
        let err = Manifest::from_yaml_str(doc).unwrap().into_registry().unwrap_err();
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
    }
}
