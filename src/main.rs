/*!
 * Memtrace Replay - Main Entry Point
 *
 * Replays a recorded JSON-lines trace through the diagnoser against the
 * simulation backend and prints the resulting allocation table.
 *
 * Usage: memtrace-replay <trace.jsonl> [case-name]
 */

use anyhow::{bail, Context, Result};
use memtrace_diagnoser::{
    init_tracing, read_archive, BenchmarkCase, CancellationRegistry, DiagnoserActionParameters,
    DiagnoserConfig, DiagnoserController, HostSignal, Payload, ProcessInfo, SimulationBackend,
    TraceEvent,
};
use std::path::PathBuf;
use tracing::{info, warn};

fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let trace_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: memtrace-replay <trace.jsonl> [case-name]"),
    };
    let case_name = args.next().unwrap_or_else(|| "Replay".to_string());

    let config = DiagnoserConfig::from_env().context("invalid MEMTRACE_* configuration")?;
    let mut events = read_archive(&trace_path)
        .with_context(|| format!("failed to read trace {}", trace_path.display()))?;
    info!(path = %trace_path.display(), events = events.len(), "trace loaded");

    // Whole trace is the window when no markers were recorded
    let has_markers = events
        .iter()
        .any(|event| matches!(event.payload, Payload::WindowStart));
    if !has_markers {
        warn!("trace has no window markers, measuring every event");
        events.insert(0, TraceEvent::window_start());
        events.push(TraceEvent::window_stop());
    }

    let backend = SimulationBackend::new();
    let registry = CancellationRegistry::new();
    let interrupt = registry.clone();
    ctrlc::set_handler(move || {
        let closed = interrupt.trigger();
        eprintln!("Interrupted, closed {} tracing session(s)", closed);
    })
    .context("failed to install Ctrl+C handler")?;

    let mut controller = DiagnoserController::new(backend.clone())
        .with_config(config)
        .with_cancellation(registry);

    // Filter on the recorded process, if the trace names one
    let process = events
        .iter()
        .find_map(|event| {
            event
                .process_name
                .as_ref()
                .map(|name| ProcessInfo::new(name.as_str(), event.pid.unwrap_or_default()))
        })
        .unwrap_or_else(|| ProcessInfo::new(PathBuf::new(), std::process::id()));

    let case = BenchmarkCase::new(case_name.as_str(), case_name.as_str());
    let session_name = case.session_name(&controller.config().session_name_prefix);
    let parameters = DiagnoserActionParameters::new(case, process);

    controller.handle(HostSignal::BeforeProcessStart, &parameters)?;
    controller.handle(HostSignal::BeforeAnythingElse, &parameters)?;
    controller.handle(HostSignal::BeforeActualRun, &parameters)?;

    match backend.injector(&session_name) {
        Some(injector) => {
            let delivered = injector.emit_all(events);
            info!(
                delivered,
                filtered = injector.filtered(),
                "trace replayed into session"
            );
        }
        None => warn!(session = %session_name, "session not active, nothing replayed"),
    }

    controller.handle(HostSignal::AfterActualRun, &parameters)?;
    controller.handle(HostSignal::AfterAll, &parameters)?;
    controller.display_results();

    for (_, display_info, result) in controller.results().iter() {
        match result.rows() {
            Some(rows) => {
                println!("{} allocations:", display_info);
                for row in rows {
                    println!("{}, {}, {}", row.name, row.total_bytes, row.count);
                }
            }
            None => println!("{}: allocations unavailable", display_info),
        }
    }

    Ok(())
}
