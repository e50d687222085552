/*!
 * Diagnoser Lifecycle Tests
 * Full host-signal sequences against the simulation backend
 */

use memtrace_diagnoser::{
    AllocationRow, BenchmarkCase, CaseResult, DiagnoserActionParameters, DiagnoserConfig,
    DiagnoserController, DiagnoserState, EventInjector, HostSignal, ProcessInfo,
    SimulationBackend, TraceEvent, TypeRecord,
};
use pretty_assertions::assert_eq;

fn parameters(folder: &str) -> DiagnoserActionParameters {
    DiagnoserActionParameters::new(
        BenchmarkCase::new(folder, format!("{}: Job", folder)),
        ProcessInfo::new("/work/bin/Bench.exe", 4242),
    )
}

fn controller(backend: &SimulationBackend) -> DiagnoserController {
    DiagnoserController::new(backend.clone()).with_config(DiagnoserConfig::for_tests())
}

fn injector(backend: &SimulationBackend, params: &DiagnoserActionParameters) -> EventInjector {
    backend
        .injector(&params.case.session_name("Memory"))
        .expect("session should be active")
}

#[test]
fn test_full_case_lifecycle() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    let params = parameters("Alloc.Foo");

    controller
        .handle(HostSignal::BeforeProcessStart, &params)
        .unwrap();
    assert_eq!(controller.state(), DiagnoserState::SessionOpen);
    let injector = injector(&backend, &params);

    controller
        .handle(HostSignal::BeforeAnythingElse, &params)
        .unwrap();
    // Runtime provider is silenced during setup
    assert!(!injector.emit(TraceEvent::allocation(7, 4096)));

    controller.handle(HostSignal::BeforeActualRun, &params).unwrap();
    assert_eq!(controller.state(), DiagnoserState::ProvidersArmed);

    assert!(injector.emit(TraceEvent::window_start()));
    assert!(injector.emit(TraceEvent::allocation(7, 64)));
    assert!(injector.emit(TraceEvent::type_metadata(7, "Foo")));
    assert!(injector.emit(TraceEvent::window_stop()));

    controller.handle(HostSignal::AfterActualRun, &params).unwrap();
    assert_eq!(controller.state(), DiagnoserState::Stopped);

    assert_eq!(
        controller.get_results(&params.case.id()),
        Some(CaseResult::Available(vec![AllocationRow::new("Foo", 1, 64)]))
    );
    assert_eq!(backend.release_count("Memory-Alloc.Foo"), 1);
}

#[test]
fn test_warmup_allocations_are_excluded() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    let params = parameters("Warmup");

    for signal in [
        HostSignal::BeforeProcessStart,
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
    ] {
        controller.handle(signal, &params).unwrap();
    }
    let injector = injector(&backend, &params);

    // Outside any window
    injector.emit(TraceEvent::allocation(1, 1000));
    injector.emit_all(vec![
        TraceEvent::window_start(),
        TraceEvent::allocation(1, 100),
        TraceEvent::allocation(2, 300),
        TraceEvent::window_stop(),
        TraceEvent::allocation(2, 5000),
        TraceEvent::window_start(),
        TraceEvent::allocation(1, 100),
        TraceEvent::window_stop(),
        TraceEvent::type_bulk(vec![TypeRecord::new(1, "Foo"), TypeRecord::new(2, "Bar")]),
    ]);

    controller.handle(HostSignal::AfterActualRun, &params).unwrap();

    assert_eq!(
        controller.get_results(&params.case.id()),
        Some(CaseResult::Available(vec![
            AllocationRow::new("Bar", 1, 300),
            AllocationRow::new("Foo", 2, 200),
        ]))
    );
}

#[test]
fn test_other_process_events_are_filtered() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    let params = parameters("Filtered");

    for signal in [
        HostSignal::BeforeProcessStart,
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
    ] {
        controller.handle(signal, &params).unwrap();
    }
    let injector = injector(&backend, &params);

    injector.emit(TraceEvent::window_start());
    assert!(injector.emit(TraceEvent::allocation(3, 24).with_process(4242, "Bench.exe")));
    assert!(!injector.emit(TraceEvent::allocation(3, 24).with_process(17, "Host.exe")));
    injector.emit(TraceEvent::window_stop());

    controller.handle(HostSignal::AfterActualRun, &params).unwrap();

    let result = controller.get_results(&params.case.id()).unwrap();
    assert_eq!(result.rows().unwrap(), &[AllocationRow::new("<unknown:3>", 1, 24)]);
}

#[test]
fn test_consecutive_cases_get_fresh_state() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);

    for (folder, size) in [("First", 10u64), ("Second", 20u64)] {
        let params = parameters(folder);
        controller
            .handle(HostSignal::BeforeProcessStart, &params)
            .unwrap();
        controller
            .handle(HostSignal::BeforeAnythingElse, &params)
            .unwrap();
        controller.handle(HostSignal::BeforeActualRun, &params).unwrap();

        let injector = injector(&backend, &params);
        injector.emit_all(vec![
            TraceEvent::window_start(),
            TraceEvent::allocation(1, size),
            TraceEvent::window_stop(),
        ]);
        controller.handle(HostSignal::AfterActualRun, &params).unwrap();
    }

    let first = controller.get_results(&parameters("First").case.id()).unwrap();
    let second = controller.get_results(&parameters("Second").case.id()).unwrap();
    assert_eq!(first.rows().unwrap()[0].total_bytes, 10);
    assert_eq!(second.rows().unwrap()[0].total_bytes, 20);
    assert_eq!(controller.results().len(), 2);
    assert_eq!(backend.sessions_created(), 2);
}

#[test]
fn test_interrupt_during_collecting() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    let params = parameters("Interrupted");

    for signal in [
        HostSignal::BeforeProcessStart,
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
    ] {
        controller.handle(signal, &params).unwrap();
    }
    let injector = injector(&backend, &params);
    injector.emit(TraceEvent::window_start());
    injector.emit(TraceEvent::allocation(1, 64));

    // Wait for the pump to apply the marker
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while controller.state() != DiagnoserState::Collecting {
        assert!(std::time::Instant::now() < deadline, "gate never opened");
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    // Interrupt arrives from another thread
    let registry = controller.cancellation_registry().clone();
    let hooks = std::thread::spawn(move || registry.trigger()).join().unwrap();
    assert_eq!(hooks, 1);
    assert_eq!(controller.state(), DiagnoserState::Stopped);
    assert!(!backend.is_active("Memory-Interrupted"));

    assert!(matches!(
        controller.get_results(&params.case.id()),
        Some(CaseResult::Unavailable(_))
    ));

    // Remaining signals are harmless and nothing is released twice
    controller.handle(HostSignal::AfterActualRun, &params).unwrap();
    controller.handle(HostSignal::AfterAll, &params).unwrap();
    assert_eq!(backend.release_count("Memory-Interrupted"), 1);
    assert_eq!(controller.cancellation_registry().count(), 0);
}

#[test]
fn test_cancel_without_session_is_noop() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    assert_eq!(controller.cancel(), 0);
    assert_eq!(controller.state(), DiagnoserState::Idle);
}

#[test]
fn test_cancellation_hook_released_after_normal_stop() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    let params = parameters("Hooks");

    controller
        .handle(HostSignal::BeforeProcessStart, &params)
        .unwrap();
    assert_eq!(controller.cancellation_registry().count(), 1);

    controller
        .handle(HostSignal::BeforeAnythingElse, &params)
        .unwrap();
    controller.handle(HostSignal::BeforeActualRun, &params).unwrap();
    controller.handle(HostSignal::AfterActualRun, &params).unwrap();
    assert_eq!(controller.cancellation_registry().count(), 0);

    // A late interrupt finds nothing to close
    assert_eq!(controller.cancel(), 0);
    assert!(controller
        .get_results(&params.case.id())
        .unwrap()
        .is_available());
}
