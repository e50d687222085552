/*!
 * Diagnoser Failure Handling Tests
 * Skipped cases, stream faults and release failures
 */

use memtrace_diagnoser::{
    BenchmarkCase, CaseResult, DiagnoserActionParameters, DiagnoserConfig, DiagnoserController,
    DiagnoserError, DiagnoserState, HostSignal, ProcessInfo, ProviderId, SimulationBackend,
    TraceEvent, UnavailableReason,
};
use std::time::Duration;

fn parameters(folder: &str) -> DiagnoserActionParameters {
    DiagnoserActionParameters::new(
        BenchmarkCase::new(folder, folder),
        ProcessInfo::new("/work/bin/Bench.exe", 4242),
    )
}

fn controller(backend: &SimulationBackend) -> DiagnoserController {
    DiagnoserController::new(backend.clone()).with_config(DiagnoserConfig::for_tests())
}

fn run_case(controller: &mut DiagnoserController, params: &DiagnoserActionParameters) {
    for signal in [
        HostSignal::BeforeProcessStart,
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
        HostSignal::AfterActualRun,
    ] {
        controller.handle(signal, params).unwrap();
    }
}

#[test]
fn test_missing_privilege_skips_case() {
    let backend = SimulationBackend::without_privilege();
    let mut controller = controller(&backend);
    let params = parameters("NoPrivilege");

    run_case(&mut controller, &params);

    assert_eq!(controller.state(), DiagnoserState::Stopped);
    assert!(matches!(
        controller.get_results(&params.case.id()),
        Some(CaseResult::Unavailable(UnavailableReason::SessionCreation(_)))
    ));
}

#[test]
fn test_name_collision_skips_only_that_case() {
    let backend = SimulationBackend::new();
    // Someone else holds the session name
    let _squatter = memtrace_diagnoser::TracingSession::open(&backend, "Memory-Taken").unwrap();

    let mut controller = controller(&backend);
    let taken = parameters("Taken");
    run_case(&mut controller, &taken);
    assert!(matches!(
        controller.get_results(&taken.case.id()),
        Some(CaseResult::Unavailable(UnavailableReason::SessionCreation(_)))
    ));

    // The run continues with the next case
    let free = parameters("Free");
    run_case(&mut controller, &free);
    assert!(controller.get_results(&free.case.id()).unwrap().is_available());
}

#[test]
fn test_rejected_provider_skips_case_and_releases_session() {
    let backend = SimulationBackend::new();
    backend.reject_provider(ProviderId::Runtime, "keyword mask not supported");
    let mut controller = controller(&backend);
    let params = parameters("Rejected");

    run_case(&mut controller, &params);

    assert!(matches!(
        controller.get_results(&params.case.id()),
        Some(CaseResult::Unavailable(UnavailableReason::ProviderConfiguration(_)))
    ));
    assert_eq!(backend.release_count("Memory-Rejected"), 1);
    assert_eq!(controller.cancellation_registry().count(), 0);
}

#[test]
fn test_stream_fault_marks_case_unavailable() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    let params = parameters("Faulted");

    for signal in [
        HostSignal::BeforeProcessStart,
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
    ] {
        controller.handle(signal, &params).unwrap();
    }
    let injector = backend.injector("Memory-Faulted").unwrap();
    injector.emit(TraceEvent::window_start());
    injector.emit(TraceEvent::allocation(1, 64));
    injector.fault("real-time buffer lost");

    // The pump closes the session itself
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while backend.is_active("Memory-Faulted") {
        assert!(std::time::Instant::now() < deadline, "session never closed");
        std::thread::sleep(Duration::from_millis(1));
    }

    controller.handle(HostSignal::AfterActualRun, &params).unwrap();

    match controller.get_results(&params.case.id()) {
        Some(CaseResult::Unavailable(UnavailableReason::StreamFault(message))) => {
            assert!(message.contains("real-time buffer lost"));
        }
        other => panic!("expected stream fault, got {:?}", other),
    }
    assert_eq!(backend.release_count("Memory-Faulted"), 1);
}

#[test]
fn test_stream_fault_before_run_keeps_fault_as_reason() {
    let backend = SimulationBackend::new();
    let mut controller = controller(&backend);
    let params = parameters("SetupFault");

    controller
        .handle(HostSignal::BeforeProcessStart, &params)
        .unwrap();
    let injector = backend.injector("Memory-SetupFault").unwrap();
    injector.emit(TraceEvent::window_start());
    injector.fault("buffer lost during setup");

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while backend.is_active("Memory-SetupFault") {
        assert!(std::time::Instant::now() < deadline, "session never closed");
        std::thread::sleep(Duration::from_millis(1));
    }

    // Provider toggles on the closed session must not mask the fault
    for signal in [
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
        HostSignal::AfterActualRun,
    ] {
        controller.handle(signal, &params).unwrap();
    }

    assert_eq!(controller.state(), DiagnoserState::Stopped);
    match controller.get_results(&params.case.id()) {
        Some(CaseResult::Unavailable(UnavailableReason::StreamFault(message))) => {
            assert!(message.contains("buffer lost during setup"));
        }
        other => panic!("expected stream fault, got {:?}", other),
    }
    assert_eq!(backend.release_count("Memory-SetupFault"), 1);
    assert_eq!(controller.cancellation_registry().count(), 0);
}

#[test]
fn test_unreleasable_session_is_fatal() {
    let backend = SimulationBackend::new();
    let config = DiagnoserConfig::for_tests().with_max_release_attempts(2);
    let mut controller = DiagnoserController::new(backend.clone()).with_config(config);
    let params = parameters("Stuck");

    for signal in [
        HostSignal::BeforeProcessStart,
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
    ] {
        controller.handle(signal, &params).unwrap();
    }

    backend.fail_next_releases(2);
    let err = controller
        .handle(HostSignal::AfterActualRun, &params)
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, DiagnoserError::ResourceRelease { attempts: 2, .. }));
    assert!(matches!(
        controller.get_results(&params.case.id()),
        Some(CaseResult::Unavailable(UnavailableReason::ReleaseFailed(_)))
    ));
}
