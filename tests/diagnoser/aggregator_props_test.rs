/*!
 * Aggregator Property Tests
 * Gate discard, name resolution under any interleaving, ordering and accumulation
 */

use memtrace_diagnoser::diagnoser::{attach_allocation_handlers, unknown_type_name};
use memtrace_diagnoser::{
    AllocationAggregator, EventSourceHandle, MeasurementWindowGate, SimulationBackend,
    TraceEvent, TracingSession,
};
use memtrace_diagnoser::{Keywords, ProviderConfig, ProviderId, TraceLevel};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Push events through a real session so dispatch happens on a pump thread
fn pump(events: Vec<TraceEvent>) -> Arc<AllocationAggregator> {
    let backend = SimulationBackend::new();
    let session = Arc::new(TracingSession::open(&backend, "Memory-Props").unwrap());
    session
        .enable_provider(ProviderConfig::new(
            ProviderId::Runtime,
            TraceLevel::Verbose,
            Keywords::ALLOCATIONS,
        ))
        .unwrap();
    session
        .enable_provider(ProviderConfig::new(
            ProviderId::Engine,
            TraceLevel::Informational,
            Keywords::ALL,
        ))
        .unwrap();

    let aggregator = Arc::new(AllocationAggregator::new());
    let gate = Arc::new(MeasurementWindowGate::new());
    let stream: EventSourceHandle = session.event_stream();
    attach_allocation_handlers(&stream, Arc::clone(&aggregator), gate);

    let injector = backend.injector("Memory-Props").unwrap();
    injector.emit_all(events);

    let pump_session = Arc::clone(&session);
    let handle = std::thread::spawn(move || pump_session.process());
    session.close().unwrap();
    handle.join().unwrap().unwrap();
    aggregator
}

proptest! {
    #[test]
    fn test_closed_gate_discards_everything(
        samples in prop::collection::vec((0u64..16, 1u64..1_000_000), 0..64)
    ) {
        let events = samples
            .iter()
            .map(|(type_id, size)| TraceEvent::allocation(*type_id, *size))
            .collect();
        let aggregator = pump(events);
        prop_assert!(aggregator.snapshot().is_empty());
    }

    #[test]
    fn test_name_resolution_independent_of_order(
        samples in prop::collection::vec(1u64..4096, 1..16),
        name_position in 0usize..17,
        with_name in any::<bool>(),
    ) {
        let mut events: Vec<TraceEvent> = samples
            .iter()
            .map(|size| TraceEvent::allocation(7, *size))
            .collect();
        if with_name {
            let position = name_position.min(events.len());
            events.insert(position, TraceEvent::type_metadata(7, "Foo"));
        }
        events.insert(0, TraceEvent::window_start());
        events.push(TraceEvent::window_stop());

        let rows = pump(events).snapshot();
        prop_assert_eq!(rows.len(), 1);
        let expected = if with_name { "Foo".to_string() } else { unknown_type_name(7) };
        prop_assert_eq!(&rows[0].name, &expected);
        prop_assert_eq!(rows[0].count, samples.len() as u64);
        prop_assert_eq!(rows[0].total_bytes, samples.iter().sum::<u64>());
    }

    #[test]
    fn test_snapshot_ordering_and_totals(
        samples in prop::collection::vec((0u64..32, 0u64..10_000), 1..200)
    ) {
        let aggregator = AllocationAggregator::new();
        let mut expected: HashMap<u64, (u64, u64)> = HashMap::new();
        let mut first_seen: Vec<u64> = Vec::new();
        for (type_id, size) in &samples {
            aggregator.record_allocation(*type_id, *size);
            let entry = expected.entry(*type_id).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += size;
            if !first_seen.contains(type_id) {
                first_seen.push(*type_id);
            }
        }

        let rows = aggregator.snapshot();
        prop_assert_eq!(rows.len(), expected.len());

        for pair in rows.windows(2) {
            prop_assert!(pair[0].total_bytes >= pair[1].total_bytes);
            if pair[0].total_bytes == pair[1].total_bytes {
                let a = first_seen.iter().position(|t| unknown_type_name(*t) == pair[0].name);
                let b = first_seen.iter().position(|t| unknown_type_name(*t) == pair[1].name);
                prop_assert!(a < b);
            }
        }

        for type_id in first_seen {
            let counter = aggregator.counter(type_id).unwrap();
            prop_assert_eq!((counter.count, counter.total_bytes), expected[&type_id]);
        }
    }
}

#[test]
fn test_accumulation_example() {
    let aggregator = AllocationAggregator::new();
    for _ in 0..3 {
        aggregator.record_allocation(1, 100);
    }
    for _ in 0..2 {
        aggregator.record_allocation(1, 50);
    }
    let counter = aggregator.counter(1).unwrap();
    assert_eq!((counter.count, counter.total_bytes), (5, 400));
}
