//! # Service registry.
//!
//! [`Registry`] is the validated, immutable set of [`ServiceSpec`]s for one
//! deployment unit, together with its precomputed start order.
//!
//! Construction rejects (in this order):
//! - empty names and duplicate names,
//! - invalid probe parameters,
//! - dependencies on undeclared services,
//! - dependency cycles, self-dependencies included (reported with their path).
//!
//! The start order is topological (dependencies first); among services that are
//! ready at the same time, the one declared first comes first.
//!
//! ```rust
//! use std::time::Duration;
//! use gatevisor::{CheckFn, Health, LaunchContext, LaunchFn, ProbeDefinition, ProbeError,
//!     Registry, ServiceHandle, ServiceSpec, StartError};
//!
//! let spec = |name: &str| {
//!     let probe = ProbeDefinition::new(
//!         CheckFn::arc(|_h: ServiceHandle| async { Ok::<_, ProbeError>(Health::Healthy) }),
//!         Duration::from_secs(1),
//!         Duration::from_secs(1),
//!         0,
//!     );
//!     let launch = LaunchFn::arc(|ctx: LaunchContext| async move {
//!         Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
//!     });
//!     ServiceSpec::new(name, launch, probe)
//! };
//!
//! let registry = Registry::new(vec![spec("app").depends_on(["db"]), spec("db")]).unwrap();
//! assert_eq!(registry.order(), ["db", "app"]);
//! ```

mod graph;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SpecError;
use crate::services::ServiceSpec;

/// Validated dependency graph of services.
#[derive(Debug)]
pub struct Registry {
    /// Declaration order.
    specs: Vec<ServiceSpec>,
    index: HashMap<Arc<str>, usize>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    /// Topological order (indices into `specs`).
    order: Vec<usize>,
}

impl Registry {
    /// Validates `specs` and computes the start order.
    pub fn new(specs: Vec<ServiceSpec>) -> Result<Self, SpecError> {
        let mut index: HashMap<Arc<str>, usize> = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if spec.name().trim().is_empty() {
                return Err(SpecError::EmptyName);
            }
            if index.insert(spec.name_arc(), i).is_some() {
                return Err(SpecError::DuplicateService {
                    name: spec.name().to_string(),
                });
            }
        }

        for spec in &specs {
            spec.probe().validate(spec.name())?;
        }

        let mut deps = Vec::with_capacity(specs.len());
        for spec in &specs {
            let mut list = Vec::with_capacity(spec.dependencies().len());
            for dep in spec.dependencies() {
                let Some(&j) = index.get(dep.as_str()) else {
                    return Err(SpecError::UnknownDependency {
                        service: spec.name().to_string(),
                        dependency: dep.clone(),
                    });
                };
                list.push(j);
            }
            deps.push(list);
        }

        let cyclic = |path: Vec<usize>| SpecError::CyclicDependency {
            cycle: path.into_iter().map(|i| specs[i].name().to_string()).collect(),
        };
        if let Some(path) = graph::find_cycle(&deps) {
            return Err(cyclic(path));
        }
        let dependents = graph::invert(&deps);
        let order = match graph::topological_order(&deps, &dependents) {
            Some(order) => order,
            None => return Err(cyclic(Vec::new())),
        };

        Ok(Self {
            specs,
            index,
            deps,
            dependents,
            order,
        })
    }

    /// Number of services.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when no service is declared.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Looks a service up by name.
    pub fn get(&self, name: &str) -> Option<&ServiceSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }

    /// True when `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Service names in start order.
    pub fn order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.specs[i].name()).collect()
    }

    /// Services in start order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceSpec> + '_ {
        self.order.iter().map(move |&i| &self.specs[i])
    }

    /// Services in declaration order.
    pub fn declared(&self) -> &[ServiceSpec] {
        &self.specs
    }

    /// Direct dependencies of `name`.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.deps)
    }

    /// Services that depend directly on `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.dependents)
    }

    /// Every service that depends on `name`, directly or transitively, in start order.
    pub fn downstream(&self, name: &str) -> Vec<&str> {
        let Some(&root) = self.index.get(name) else {
            return Vec::new();
        };
        let mut reached = vec![false; self.specs.len()];
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for &next in &self.dependents[node] {
                if !reached[next] {
                    reached[next] = true;
                    stack.push(next);
                }
            }
        }
        self.order
            .iter()
            .filter(|&&i| reached[i])
            .map(|&i| self.specs[i].name())
            .collect()
    }

    fn neighbours<'a>(&'a self, name: &str, adjacency: &[Vec<usize>]) -> Vec<&'a str> {
        match self.index.get(name) {
            Some(&i) => adjacency[i].iter().map(|&j| self.specs[j].name()).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{ProbeError, StartError};
    use crate::probe::{CheckFn, Health, ProbeDefinition};
    use crate::services::{LaunchContext, LaunchFn, ServiceHandle};

    fn spec(name: &str, deps: &[&str]) -> ServiceSpec {
        let probe = ProbeDefinition::new(
            CheckFn::arc(|_h: ServiceHandle| async { Ok::<_, ProbeError>(Health::Healthy) }),
            Duration::from_millis(10),
            Duration::from_millis(10),
            0,
        );
        let launch = LaunchFn::arc(|ctx: LaunchContext| async move {
            Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
        });
        ServiceSpec::new(name, launch, probe).depends_on(deps.iter().copied())
    }

    #[test]
    fn order_respects_dependencies_and_declaration() {
        let registry = Registry::new(vec![
            spec("web", &["api"]),
            spec("api", &["db", "cache"]),
            spec("cache", &[]),
            spec("db", &[]),
            spec("metrics", &[]),
        ])
        .unwrap();

        assert_eq!(registry.order(), ["cache", "db", "api", "web", "metrics"]);
        assert_eq!(registry.dependencies("api"), ["db", "cache"]);
        assert_eq!(registry.dependents("db"), ["api"]);
        assert_eq!(registry.downstream("db"), ["api", "web"]);
        assert!(registry.downstream("web").is_empty());
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = Registry::new(vec![spec("app", &["db"])]).unwrap_err();
        assert_eq!(
            err,
            SpecError::UnknownDependency {
                service: "app".into(),
                dependency: "db".into()
            }
        );
    }

    #[test]
    fn rejects_duplicates_and_empty_names() {
        let err = Registry::new(vec![spec("db", &[]), spec("db", &[])]).unwrap_err();
        assert_eq!(err.as_label(), "spec_duplicate_service");

        let err = Registry::new(vec![spec(" ", &[])]).unwrap_err();
        assert_eq!(err, SpecError::EmptyName);
    }

    #[test]
    fn rejects_every_rotation_of_a_cycle() {
        let names = ["a", "b", "c"];
        for shift in 0..names.len() {
            let specs = (0..names.len())
                .map(|k| {
                    let i = (k + shift) % names.len();
                    let next = names[(i + 1) % names.len()];
                    spec(names[i], &[next])
                })
                .collect();
            let err = Registry::new(specs).unwrap_err();
            let SpecError::CyclicDependency { cycle } = err else {
                panic!("expected cycle error, got {err:?}");
            };
            assert_eq!(cycle.len(), 4);
            assert_eq!(cycle.first(), cycle.last());
        }
    }

    #[test]
    fn rejects_self_dependency() {
        let err = Registry::new(vec![spec("db", &["db"])]).unwrap_err();
        assert_eq!(
            err,
            SpecError::CyclicDependency {
                cycle: vec!["db".into(), "db".into()]
            }
        );
        assert_eq!(err.to_string(), "cyclic dependency: db -> db");
    }

    #[test]
    fn rejects_invalid_probe() {
        let mut bad = spec("db", &[]);
        bad = ServiceSpec::new(
            "db",
            bad.launch().clone(),
            ProbeDefinition::new(
                bad.probe().check().clone(),
                Duration::ZERO,
                Duration::from_millis(10),
                1,
            ),
        );
        let err = Registry::new(vec![bad]).unwrap_err();
        assert_eq!(err.as_label(), "spec_invalid_probe");
    }
}
