/*!
 * Tracing Session Tests
 * Release semantics, cancellation scoping and the pump rendezvous
 */

use memtrace_diagnoser::{
    CancellationRegistry, Keywords, ProviderConfig, ProviderId, PumpGuard, SimulationBackend,
    TraceEvent, TraceLevel, TracingSession,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn runtime_config() -> ProviderConfig {
    ProviderConfig::new(ProviderId::Runtime, TraceLevel::Verbose, Keywords::ALLOCATIONS)
}

#[test]
fn test_close_from_many_threads_releases_once() {
    let backend = SimulationBackend::new();
    let session = Arc::new(TracingSession::open(&backend, "Memory-Race").unwrap());
    let registry = CancellationRegistry::new();
    session.register_cancellation(&registry);

    let mut handles = Vec::new();
    for i in 0..8 {
        let session = Arc::clone(&session);
        let registry = registry.clone();
        handles.push(std::thread::spawn(move || {
            if i % 2 == 0 {
                session.close().unwrap();
            } else {
                registry.trigger();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(session.is_closed());
    assert_eq!(backend.release_count("Memory-Race"), 1);
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_pump_sees_events_after_rendezvous() {
    let backend = SimulationBackend::new();
    let session = Arc::new(TracingSession::open(&backend, "Memory-Rendezvous").unwrap());
    session.enable_provider(runtime_config()).unwrap();

    let seen = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&seen);
    session.event_stream().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let pump_session = Arc::clone(&session);
    let pump = PumpGuard::spawn("trace-pump-test", move || pump_session.process()).unwrap();
    pump.wait_until_started(Duration::from_millis(1));
    assert!(pump.has_started());

    let injector = backend.injector("Memory-Rendezvous").unwrap();
    let delivered = injector.emit_all((0..100).map(|i| TraceEvent::allocation(i, 16)));
    assert_eq!(delivered, 100);

    session.close().unwrap();
    pump.join().unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 100);
    assert!(!session.is_processing());
}

#[test]
fn test_enable_after_close_fails() {
    let backend = SimulationBackend::new();
    let session = TracingSession::open(&backend, "Memory-Closed").unwrap();
    session.close().unwrap();
    assert!(session.enable_provider(runtime_config()).is_err());
}

#[test]
fn test_disable_unknown_provider_is_noop() {
    let backend = SimulationBackend::new();
    let session = TracingSession::open(&backend, "Memory-Noop").unwrap();
    assert!(session.disable_provider(ProviderId::KernelImageLoad).is_ok());
    assert!(!session.is_enabled(ProviderId::KernelImageLoad));
}

#[test]
fn test_closer_from_other_thread() {
    let backend = SimulationBackend::new();
    let session = TracingSession::open(&backend, "Memory-Closer").unwrap();
    let closer = session.closer();
    assert_eq!(closer.session_name(), "Memory-Closer");

    std::thread::spawn(move || closer.close_quietly())
        .join()
        .unwrap();
    assert!(session.is_closed());
    assert!(!session.was_cancelled());
}
