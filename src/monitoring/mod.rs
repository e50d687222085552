/*!
 * Monitoring
 * Trace event model, event streaming and structured logging
 */

pub mod events;
pub mod streaming;
mod tracer;

pub use events::{Payload, TraceEvent, TypeRecord};
pub use streaming::{EventSourceHandle, StreamStats, SubscriptionId, SubscriptionType};
pub use tracer::{init_tracing, span_case, CaseSpan};
