/*!
 * Event Archive Tests
 * Recording a case through the controller and replaying the archive
 */

use memtrace_diagnoser::{
    read_archive, AllocationRow, BenchmarkCase, CaseResult, DiagnoserActionParameters,
    DiagnoserConfig, DiagnoserController, HostSignal, Payload, ProcessInfo, SimulationBackend,
    TraceEvent,
};
use pretty_assertions::assert_eq;
use std::path::Path;

fn run_recorded(
    backend: &SimulationBackend,
    config: DiagnoserConfig,
    folder: &str,
    events: Vec<TraceEvent>,
) -> Option<CaseResult> {
    let mut controller = DiagnoserController::new(backend.clone()).with_config(config);
    let params = DiagnoserActionParameters::new(
        BenchmarkCase::new(folder, folder),
        ProcessInfo::new("/work/Bench.exe", 1),
    );

    for signal in [
        HostSignal::BeforeProcessStart,
        HostSignal::BeforeAnythingElse,
        HostSignal::BeforeActualRun,
    ] {
        controller.handle(signal, &params).unwrap();
    }
    let injector = backend
        .injector(&params.case.session_name("Memory"))
        .unwrap();
    injector.emit_all(events);
    controller.handle(HostSignal::AfterActualRun, &params).unwrap();
    controller.get_results(&params.case.id())
}

fn recorded_events() -> Vec<TraceEvent> {
    vec![
        TraceEvent::window_start(),
        TraceEvent::allocation(1, 48),
        TraceEvent::allocation(2, 96),
        TraceEvent::type_metadata(1, "System.String"),
        TraceEvent::type_metadata(2, "System.Byte[]"),
        TraceEvent::window_stop(),
    ]
}

#[test]
fn test_archive_records_every_delivered_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("case.jsonl");
    let config = DiagnoserConfig::for_tests().with_archive_path(&path);

    let result = run_recorded(&SimulationBackend::new(), config, "Archived", recorded_events());
    assert!(result.unwrap().is_available());

    let archived = read_archive(&path).unwrap();
    assert_eq!(archived.len(), 6);
    assert!(matches!(archived[0].payload, Payload::WindowStart));
    assert!(matches!(archived[5].payload, Payload::WindowStop));
}

#[test]
fn test_replayed_archive_reproduces_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("case.jsonl");

    let original = run_recorded(
        &SimulationBackend::new(),
        DiagnoserConfig::for_tests().with_archive_path(&path),
        "Original",
        recorded_events(),
    );
    let replayed = run_recorded(
        &SimulationBackend::new(),
        DiagnoserConfig::for_tests(),
        "Replayed",
        read_archive(&path).unwrap(),
    );

    assert_eq!(original, replayed);
    assert_eq!(
        replayed.unwrap().rows().unwrap().to_vec(),
        vec![
            AllocationRow::new("System.Byte[]", 1, 96),
            AllocationRow::new("System.String", 1, 48),
        ]
    );
}

#[test]
fn test_unwritable_archive_does_not_fail_case() {
    let config = DiagnoserConfig::for_tests()
        .with_archive_path(Path::new("/nonexistent-dir/for/archive.jsonl"));
    let result = run_recorded(&SimulationBackend::new(), config, "NoArchive", recorded_events());
    assert!(result.unwrap().is_available());
}
