use std::sync::{Arc, Mutex};

use gremlin_core::{
    random_source, Coordinator, CrashReport, DiagnosticError, Diagnostics, InjectResult,
    LogDiagnostics, ReportKind, RunConfig, Session, SessionError, StopReason, Target,
};
use gremlin_event::{Category, ComponentName, Event, PhysicalKeys, Rotation};

#[derive(Clone, Default)]
struct SharedTarget {
    injected: Arc<Mutex<Vec<Event>>>,
    transport_error_at: Option<usize>,
    /// Reports a crash through this coordinator on the given injection.
    crash_at: Option<(usize, Arc<Mutex<Option<Coordinator>>>)>,
}

impl Target for SharedTarget {
    fn inject(&mut self, event: &Event) -> InjectResult {
        let n = {
            let mut injected = self.injected.lock().unwrap();
            injected.push(event.clone());
            injected.len()
        };
        if let Some((at, coordinator)) = &self.crash_at {
            if n == *at {
                if let Some(coordinator) = coordinator.lock().unwrap().as_ref() {
                    coordinator.process_crashed(&CrashReport {
                        process: "com.example".into(),
                        short_msg: "boom".into(),
                        ..Default::default()
                    });
                }
            }
        }
        if self.transport_error_at == Some(n) {
            return InjectResult::TransportError;
        }
        InjectResult::Success
    }
}

#[derive(Clone, Default)]
struct SharedRecorder(Arc<Mutex<Vec<ReportKind>>>);

impl Diagnostics for SharedRecorder {
    fn capture(&mut self, report: &ReportKind) -> Result<(), DiagnosticError> {
        self.0.lock().unwrap().push(report.clone());
        Ok(())
    }
}

fn config(count: u64, seed: u64) -> RunConfig {
    RunConfig {
        count,
        seed: Some(seed),
        apps: vec![ComponentName::new("com.example", ".MainActivity")],
        ..Default::default()
    }
}

#[test]
fn test_complete_run_exits_zero() {
    let mut config = config(50, 42);
    let source = random_source(&mut config, PhysicalKeys::all());
    let target = SharedTarget::default();
    let injected = Arc::clone(&target.injected);

    let session = Session::new(config, source, target, LogDiagnostics).unwrap();
    let outcome = session.run();

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.seed, Some(42));
    assert_eq!(outcome.summary.stop, StopReason::Complete);
    assert_eq!(outcome.summary.events_injected, 50);

    let injected = injected.lock().unwrap();
    // Initial launch first, rotation reset last.
    assert!(matches!(injected[0], Event::AppSwitch { .. }));
    assert_eq!(
        injected.last(),
        Some(&Event::Rotation {
            rotation: Rotation::Deg0,
            persist: false
        })
    );
}

#[test]
fn test_same_seed_same_injections() {
    let injections = |seed| {
        let mut config = config(300, seed);
        let source = random_source(&mut config, PhysicalKeys::all());
        let target = SharedTarget::default();
        let injected = Arc::clone(&target.injected);
        Session::new(config, source, target, LogDiagnostics)
            .unwrap()
            .run();
        let events = injected.lock().unwrap().clone();
        events
    };
    assert_eq!(injections(9), injections(9));
}

#[test]
fn test_transport_error_exit_code_is_event_count() {
    let mut config = config(100, 3);
    let source = random_source(&mut config, PhysicalKeys::all());
    let target = SharedTarget {
        transport_error_at: Some(7),
        ..Default::default()
    };

    let outcome = Session::new(config, source, target, LogDiagnostics)
        .unwrap()
        .run();
    assert_eq!(outcome.summary.stop, StopReason::SystemCrashed);
    assert_eq!(outcome.exit_code, 7);
}

#[test]
fn test_crash_during_run_aborts_with_bugreport() {
    let mut config = config(100, 5);
    config.request_bugreport = true;
    let source = random_source(&mut config, PhysicalKeys::all());
    let slot = Arc::new(Mutex::new(None));
    let target = SharedTarget {
        crash_at: Some((4, Arc::clone(&slot))),
        ..Default::default()
    };
    let recorder = SharedRecorder::default();
    let captured = Arc::clone(&recorder.0);

    let session = Session::new(config, source, target, recorder).unwrap();
    *slot.lock().unwrap() = Some(session.coordinator());
    let outcome = session.run();

    assert_eq!(outcome.summary.stop, StopReason::Aborted);
    assert_eq!(outcome.summary.events_injected, 4);
    assert_eq!(outcome.exit_code, 4);
    assert_eq!(
        *captured.lock().unwrap(),
        vec![ReportKind::CrashBugreport {
            process: "com.example".into()
        }]
    );
}

#[test]
fn test_conflicting_package_lists_fail_startup() {
    let mut config = config(10, 1);
    config.allowed_packages.insert("com.a".into());
    config.denied_packages.insert("com.b".into());
    let source = random_source(&mut config, PhysicalKeys::all());
    let target = SharedTarget::default();
    let injected = Arc::clone(&target.injected);

    let err = Session::new(config, source, target, LogDiagnostics)
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::Config(_)));
    assert_eq!(err.exit_code(), -1);
    assert!(injected.lock().unwrap().is_empty());
}

#[test]
fn test_bad_weights_fail_startup() {
    let mut config = config(10, 1);
    config.percentages.insert(Category::Touch, 70.0);
    config.percentages.insert(Category::Nav, 40.0);
    let source = random_source(&mut config, PhysicalKeys::all());

    let err = Session::new(config, source, SharedTarget::default(), LogDiagnostics)
        .err()
        .unwrap();
    assert!(matches!(err, SessionError::Source(_)));
    assert_eq!(err.exit_code(), -5);
}

#[test]
fn test_json_config_drives_a_run() {
    let mut config = RunConfig::from_json(
        r#"{
            "count": 30,
            "seed": 11,
            "percentages": { "touch": 50, "nav": 50 }
        }"#,
    )
    .unwrap();
    let source = random_source(&mut config, PhysicalKeys::all());
    let target = SharedTarget::default();
    let injected = Arc::clone(&target.injected);

    let outcome = Session::new(config, source, target, LogDiagnostics)
        .unwrap()
        .run();
    assert_eq!(outcome.exit_code, 0);

    let injected = injected.lock().unwrap();
    let body = &injected[..injected.len() - 1];
    assert!(body
        .iter()
        .all(|e| matches!(e, Event::Touch(_) | Event::Key { .. })));
}
