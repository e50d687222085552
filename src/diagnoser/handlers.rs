/*!
 * Stream Handlers
 * Wires the aggregator and window gate to a session's event stream
 */

use super::aggregator::AllocationAggregator;
use super::gate::MeasurementWindowGate;
use crate::monitoring::events::{Payload, TraceEvent};
use crate::monitoring::streaming::{EventSourceHandle, SubscriptionId};
use crate::session::provider::ProviderId;
use std::sync::Arc;

/// Subscriptions created by [`attach_allocation_handlers`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerSubscriptions {
    pub markers: SubscriptionId,
    pub runtime: SubscriptionId,
}

/// Subscribe the gate to engine markers and the aggregator to runtime events
///
/// Must be called before the session starts pumping. Both callbacks run on
/// the pump thread, so a marker is always applied before any allocation
/// that follows it on the stream.
pub fn attach_allocation_handlers(
    stream: &EventSourceHandle,
    aggregator: Arc<AllocationAggregator>,
    gate: Arc<MeasurementWindowGate>,
) -> HandlerSubscriptions {
    let marker_gate = Arc::clone(&gate);
    let markers = stream.subscribe_provider(ProviderId::Engine, move |event| {
        match event.payload {
            Payload::WindowStart => marker_gate.on_window_start(),
            Payload::WindowStop => marker_gate.on_window_stop(),
            _ => {}
        }
    });

    let runtime = stream.subscribe_provider(ProviderId::Runtime, move |event| {
        fold_runtime_event(&aggregator, &gate, event)
    });

    HandlerSubscriptions { markers, runtime }
}

#[inline]
fn fold_runtime_event(
    aggregator: &AllocationAggregator,
    gate: &MeasurementWindowGate,
    event: &TraceEvent,
) {
    match &event.payload {
        Payload::AllocationSample {
            type_id,
            total_size,
        } => {
            if gate.is_open() {
                aggregator.record_allocation(*type_id, *total_size);
            }
        }
        Payload::TypeMetadata { type_id, name } => {
            aggregator.record_type_name(*type_id, name.as_str());
        }
        Payload::TypeBulk { types } => {
            for record in types {
                aggregator.record_type_name(record.type_id, record.name.as_str());
            }
        }
        _ => {}
    }
}
