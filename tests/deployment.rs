use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use gatevisor::{
    CheckFn, CheckRef, DeploymentError, Event, EventKind, Health, LaunchContext, LaunchFn,
    LaunchRef, ProbeDefinition, ProbeError, Registry, ServiceHandle, ServiceSpec, ServiceState,
    SpecError, StartError, Supervisor, SupervisorConfig,
};

const SEC: Duration = Duration::from_secs(1);

/// Check that becomes healthy on call number `healthy_from` (never when 0).
fn counting_check(calls: Arc<AtomicU32>, healthy_from: u32) -> CheckRef {
    CheckFn::arc(move |_h: ServiceHandle| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if healthy_from != 0 && n >= healthy_from {
                Ok::<_, ProbeError>(Health::Healthy)
            } else {
                Ok(Health::unhealthy("connection refused"))
            }
        }
    })
}

fn healthy_check() -> CheckRef {
    CheckFn::arc(|_h: ServiceHandle| async { Ok::<_, ProbeError>(Health::Healthy) })
}

fn probe(check: CheckRef, retries: u32) -> ProbeDefinition {
    ProbeDefinition::new(check, SEC, SEC, retries)
}

/// Launcher that appends the service name to `log`.
fn logging_launch(log: Arc<Mutex<Vec<String>>>) -> LaunchRef {
    LaunchFn::arc(move |ctx: LaunchContext| {
        log.lock().unwrap().push(ctx.service().to_string());
        async move { Ok::<_, StartError>(ServiceHandle::new(ctx.service())) }
    })
}

fn supervisor(cfg: SupervisorConfig) -> Arc<Supervisor> {
    Supervisor::builder(cfg).build()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn app_starts_after_db_reports_healthy_on_third_attempt() {
    let db_calls = Arc::new(AtomicU32::new(0));
    let seen_at_launch = Arc::new(AtomicU32::new(0));
    let app_launch = {
        let db_calls = db_calls.clone();
        let seen = seen_at_launch.clone();
        LaunchFn::arc(move |ctx: LaunchContext| {
            seen.store(db_calls.load(Ordering::SeqCst), Ordering::SeqCst);
            async move { Ok::<_, StartError>(ServiceHandle::new(ctx.service())) }
        })
    };
    let log = Arc::new(Mutex::new(Vec::new()));

    let registry = Registry::new(vec![
        ServiceSpec::new("app", app_launch, probe(healthy_check(), 5)).depends_on(["db"]),
        ServiceSpec::new("db", logging_launch(log.clone()), probe(counting_check(db_calls.clone(), 3), 5)),
    ])
    .unwrap();

    let sup = supervisor(SupervisorConfig::default());
    let started = Instant::now();
    sup.run(Arc::new(registry), CancellationToken::new()).await.unwrap();

    // two failed attempts, two intervals
    assert!(started.elapsed() >= 2 * SEC);
    assert_eq!(*log.lock().unwrap(), vec!["db".to_string()]);
    // own readiness took three attempts; the gate of app cleared with one more
    assert_eq!(seen_at_launch.load(Ordering::SeqCst), 4);
    assert_eq!(db_calls.load(Ordering::SeqCst), 4);

    let snapshot = sup.snapshot().await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].name, "db");
    assert_eq!(snapshot[0].state, ServiceState::Healthy);
    assert_eq!(snapshot[0].attempts, Some(3));
    assert_eq!(snapshot[1].name, "app");
    assert_eq!(snapshot[1].state, ServiceState::Healthy);
    assert_eq!(snapshot[1].attempts, Some(1));
}

#[tokio::test(start_paused = true)]
async fn app_never_starts_when_db_never_becomes_healthy() {
    let db_calls = Arc::new(AtomicU32::new(0));
    let log = Arc::new(Mutex::new(Vec::new()));

    let registry = Registry::new(vec![
        ServiceSpec::new("db", logging_launch(log.clone()), probe(counting_check(db_calls.clone(), 0), 5)),
        ServiceSpec::new("app", logging_launch(log.clone()), probe(healthy_check(), 5)).depends_on(["db"]),
    ])
    .unwrap();

    let sup = supervisor(SupervisorConfig::default());
    let err = sup
        .run(Arc::new(registry), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DeploymentError::DependencyUnhealthy {
            dependency: "db".into(),
            blocked: vec!["app".into()],
        }
    );
    assert_eq!(db_calls.load(Ordering::SeqCst), 6);
    assert_eq!(*log.lock().unwrap(), vec!["db".to_string()]);
    assert_eq!(sup.state_of("db").await, Some(ServiceState::Failed));
    assert_eq!(sup.state_of("app").await, Some(ServiceState::Failed));

    let snapshot = sup.snapshot().await;
    assert_eq!(snapshot[0].attempts, Some(6));
    assert_eq!(snapshot[1].reason.as_deref(), Some("dependency `db` failed"));
}

#[tokio::test(start_paused = true)]
async fn dependency_that_stops_answering_fails_the_gate() {
    let db_calls = Arc::new(AtomicU32::new(0));
    let db_check = {
        let calls = db_calls.clone();
        CheckFn::arc(move |_h: ServiceHandle| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Ok::<_, ProbeError>(Health::Healthy)
                } else {
                    Ok(Health::unhealthy("connection reset"))
                }
            }
        })
    };
    let log = Arc::new(Mutex::new(Vec::new()));

    let registry = Registry::new(vec![
        ServiceSpec::new("db", logging_launch(log.clone()), probe(db_check, 2)),
        ServiceSpec::new("app", logging_launch(log.clone()), probe(healthy_check(), 2)).depends_on(["db"]),
        ServiceSpec::new("web", logging_launch(log.clone()), probe(healthy_check(), 2)).depends_on(["app"]),
    ])
    .unwrap();

    let sup = supervisor(SupervisorConfig::default());
    let mut rx = sup.bus().subscribe();
    let err = sup
        .run(Arc::new(registry), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DeploymentError::DependencyUnhealthy {
            dependency: "db".into(),
            blocked: vec!["app".into(), "web".into()],
        }
    );
    // one healthy answer, then the full budget of app's gate
    assert_eq!(db_calls.load(Ordering::SeqCst), 4);
    assert_eq!(*log.lock().unwrap(), vec!["db".to_string()]);

    let snapshot = sup.snapshot().await;
    assert_eq!(snapshot[0].name, "db");
    assert_eq!(snapshot[0].state, ServiceState::Healthy);
    assert_eq!(snapshot[0].attempts, Some(1));
    assert_eq!(snapshot[1].state, ServiceState::Failed);
    assert_eq!(snapshot[1].reason.as_deref(), Some("dependency `db` is unhealthy"));
    assert_eq!(snapshot[2].state, ServiceState::Failed);
    assert_eq!(snapshot[2].reason.as_deref(), Some("dependency `app` failed"));

    let events = drain(&mut rx);
    let blocked: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::ServiceBlocked)
        .map(|e| (e.service.as_deref().unwrap(), e.dependency.as_deref()))
        .collect();
    assert_eq!(blocked, vec![("web", Some("app"))]);
    assert!(!events
        .iter()
        .any(|e| e.kind == EventKind::ServiceStarting && e.service.as_deref() != Some("db")));
}

#[tokio::test(start_paused = true)]
async fn leaf_that_never_becomes_healthy_uses_exactly_its_budget() {
    for retries in [0u32, 1, 4] {
        let calls = Arc::new(AtomicU32::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = Registry::new(vec![ServiceSpec::new(
            "worker",
            logging_launch(log),
            probe(counting_check(calls.clone(), 0), retries),
        )])
        .unwrap();

        let err = supervisor(SupervisorConfig::default())
            .run(Arc::new(registry), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
        assert!(
            matches!(&err, DeploymentError::ServiceFailed { service, attempts, .. }
                if service == "worker" && *attempts == retries + 1),
            "unexpected error: {err:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn every_start_follows_healthy_transitive_dependencies() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let spec = |name: &str, deps: &[&str]| {
        ServiceSpec::new(name, logging_launch(log.clone()), probe(healthy_check(), 2))
            .depends_on(deps.iter().copied())
    };
    let registry = Registry::new(vec![
        spec("web", &["api", "cache"]),
        spec("api", &["db", "queue"]),
        spec("worker", &["queue"]),
        spec("queue", &[]),
        spec("db", &[]),
        spec("cache", &["db"]),
    ])
    .unwrap();
    let deps: HashMap<String, Vec<String>> = registry
        .declared()
        .iter()
        .map(|s| (s.name().to_string(), s.dependencies().to_vec()))
        .collect();

    let sup = supervisor(SupervisorConfig::default());
    let mut rx = sup.bus().subscribe();
    sup.run(Arc::new(registry), CancellationToken::new()).await.unwrap();

    let events = drain(&mut rx);
    let healthy_seq = |name: &str| {
        events
            .iter()
            .find(|e| e.kind == EventKind::ServiceHealthy && e.service.as_deref() == Some(name))
            .map(|e| e.seq)
    };
    let mut starts = 0;
    for ev in events.iter().filter(|e| e.kind == EventKind::ServiceStarting) {
        starts += 1;
        let name = ev.service.as_deref().unwrap();
        for dep in &deps[name] {
            let healthy = healthy_seq(dep.as_str()).expect("dependency became healthy");
            assert!(healthy < ev.seq, "{name} started before {dep} was healthy");
        }
    }
    assert_eq!(starts, 6);
    assert_eq!(log.lock().unwrap().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn independent_branches_continue_and_failures_are_collected() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new(vec![
        ServiceSpec::new("a", logging_launch(log.clone()), probe(counting_check(Arc::default(), 0), 1)),
        ServiceSpec::new("b", logging_launch(log.clone()), probe(counting_check(Arc::default(), 0), 2)),
        ServiceSpec::new("c", logging_launch(log.clone()), probe(healthy_check(), 1)),
        ServiceSpec::new("d", logging_launch(log.clone()), probe(healthy_check(), 1)).depends_on(["c"]),
        ServiceSpec::new("e", logging_launch(log.clone()), probe(healthy_check(), 1)).depends_on(["a"]),
    ])
    .unwrap();

    let sup = supervisor(SupervisorConfig::default());
    let err = sup
        .run(Arc::new(registry), CancellationToken::new())
        .await
        .unwrap_err();

    let DeploymentError::Multiple(errors) = &err else {
        panic!("expected multiple failures, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors[0],
        DeploymentError::DependencyUnhealthy {
            dependency: "a".into(),
            blocked: vec!["e".into()],
        }
    );
    assert!(matches!(&errors[1], DeploymentError::ServiceFailed { service, attempts: 3, .. } if service == "b"));
    assert_eq!(err.failed_services(), vec!["a", "b"]);

    assert_eq!(sup.state_of("c").await, Some(ServiceState::Healthy));
    assert_eq!(sup.state_of("d").await, Some(ServiceState::Healthy));
    assert_eq!(sup.state_of("e").await, Some(ServiceState::Failed));
    assert!(!log.lock().unwrap().contains(&"e".to_string()));
}

#[tokio::test(start_paused = true)]
async fn failing_start_blocks_dependents() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let broken = LaunchFn::arc(|_ctx: LaunchContext| async {
        Err::<ServiceHandle, _>(StartError::Failed {
            reason: "port already in use".into(),
        })
    });
    let registry = Registry::new(vec![
        ServiceSpec::new("db", broken, probe(healthy_check(), 1)),
        ServiceSpec::new("app", logging_launch(log.clone()), probe(healthy_check(), 1)).depends_on(["db"]),
        ServiceSpec::new("cache", logging_launch(log.clone()), probe(healthy_check(), 1)),
    ])
    .unwrap();

    let sup = supervisor(SupervisorConfig::default());
    let err = sup
        .run(Arc::new(registry), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DeploymentError::StartFailed {
            service: "db".into(),
            reason: "start failed: port already in use".into(),
        }
    );
    assert_eq!(*log.lock().unwrap(), vec!["cache".to_string()]);
    assert_eq!(sup.state_of("app").await, Some(ServiceState::Failed));
    assert_eq!(sup.state_of("cache").await, Some(ServiceState::Healthy));
}

#[tokio::test(start_paused = true)]
async fn start_timeout_from_config_fails_the_service() {
    let slow = LaunchFn::arc(|ctx: LaunchContext| async move {
        time::sleep(Duration::from_secs(60)).await;
        Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
    });
    let registry = Registry::new(vec![ServiceSpec::new("db", slow, probe(healthy_check(), 1))]).unwrap();

    let cfg = SupervisorConfig {
        start_timeout: Duration::from_secs(5),
        ..SupervisorConfig::default()
    };
    let started = Instant::now();
    let err = supervisor(cfg)
        .run(Arc::new(registry), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(&err, DeploymentError::StartFailed { service, .. } if service == "db"));
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn cancellation_abandons_the_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let db_calls = Arc::new(AtomicU32::new(0));
    let registry = Registry::new(vec![
        ServiceSpec::new("db", logging_launch(log.clone()), probe(counting_check(db_calls.clone(), 0), 100)),
        ServiceSpec::new("app", logging_launch(log.clone()), probe(healthy_check(), 1)).depends_on(["db"]),
    ])
    .unwrap();

    let sup = supervisor(SupervisorConfig::default());
    let mut rx = sup.bus().subscribe();
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(3500)).await;
            token.cancel();
        });
    }

    let err = sup.run(Arc::new(registry), token).await.unwrap_err();
    assert_eq!(err, DeploymentError::Cancelled);

    let calls = db_calls.load(Ordering::SeqCst);
    assert_eq!(calls, 4);
    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(db_calls.load(Ordering::SeqCst), calls, "probing stopped");

    assert_eq!(*log.lock().unwrap(), vec!["db".to_string()]);
    assert_eq!(sup.state_of("db").await, Some(ServiceState::Starting));
    assert_eq!(sup.state_of("app").await, Some(ServiceState::Pending));
    assert!(drain(&mut rx)
        .iter()
        .any(|e| e.kind == EventKind::DeploymentCancelled));
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_launches_nothing() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new(vec![ServiceSpec::new("db", logging_launch(log.clone()), probe(healthy_check(), 1))]).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = supervisor(SupervisorConfig::default())
        .run(Arc::new(registry), token)
        .await
        .unwrap_err();
    assert_eq!(err, DeploymentError::Cancelled);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn healthy_dependencies_clear_gates_on_first_attempt() {
    let calls: Vec<Arc<AtomicU32>> = (0..3).map(|_| Arc::default()).collect();
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = Registry::new(vec![
        ServiceSpec::new("a", logging_launch(log.clone()), probe(counting_check(calls[0].clone(), 1), 3)),
        ServiceSpec::new("b", logging_launch(log.clone()), probe(counting_check(calls[1].clone(), 1), 3)).depends_on(["a"]),
        ServiceSpec::new("c", logging_launch(log.clone()), probe(counting_check(calls[2].clone(), 1), 3)).depends_on(["a", "b"]),
    ])
    .unwrap();

    let sup = supervisor(SupervisorConfig::default());
    let mut rx = sup.bus().subscribe();
    let started = Instant::now();
    sup.run(Arc::new(registry), CancellationToken::new()).await.unwrap();

    assert_eq!(started.elapsed(), Duration::ZERO);
    // own probe plus one gate probe per direct dependent
    assert_eq!(calls[0].load(Ordering::SeqCst), 3);
    assert_eq!(calls[1].load(Ordering::SeqCst), 2);
    assert_eq!(calls[2].load(Ordering::SeqCst), 1);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .filter(|e| e.kind == EventKind::ProbeSucceeded)
        .all(|e| e.attempt == Some(1)));
    assert!(!events.iter().any(|e| e.kind == EventKind::RetryScheduled));
    assert_eq!(
        events.iter().filter(|e| e.kind == EventKind::GateCleared).count(),
        3
    );
}

#[tokio::test(start_paused = true)]
async fn concurrency_limit_serialises_bring_ups() {
    async fn run_with(max_concurrent: usize) -> (usize, Duration) {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let launch = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            LaunchFn::arc(move |ctx: LaunchContext| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    time::sleep(SEC).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, StartError>(ServiceHandle::new(ctx.service()))
                }
            })
        };
        let registry = Registry::new(
            ["x", "y", "z"]
                .into_iter()
                .map(|n| ServiceSpec::new(n, launch.clone(), probe(healthy_check(), 1)))
                .collect(),
        )
        .unwrap();

        let cfg = SupervisorConfig {
            max_concurrent,
            ..SupervisorConfig::default()
        };
        let started = Instant::now();
        supervisor(cfg)
            .run(Arc::new(registry), CancellationToken::new())
            .await
            .unwrap();
        (peak.load(Ordering::SeqCst), started.elapsed())
    }

    let (peak, elapsed) = run_with(1).await;
    assert_eq!(peak, 1);
    assert_eq!(elapsed, 3 * SEC);

    let (peak, elapsed) = run_with(0).await;
    assert_eq!(peak, 3);
    assert_eq!(elapsed, SEC);
}

#[test]
fn every_rotation_of_a_cycle_is_rejected() {
    let names = ["a", "b", "c"];
    for shift in 0..names.len() {
        let specs = (0..names.len())
            .map(|i| {
                let name = names[(i + shift) % names.len()];
                let next = names[(i + shift + 1) % names.len()];
                ServiceSpec::new(name, logging_launch(Arc::default()), probe(healthy_check(), 1))
                    .depends_on([next])
            })
            .collect();
        let err = Registry::new(specs).unwrap_err();
        let SpecError::CyclicDependency { cycle } = &err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert_eq!(cycle.len(), 4);
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(err.as_label(), "spec_cyclic_dependency");
    }
}
