/*!
 * Memtrace Diagnoser Library
 * Tracing-session lifecycle and per-type allocation aggregation for benchmark cases
 */

pub mod core;
pub mod diagnoser;
pub mod monitoring;
pub mod session;

// Re-exports
pub use crate::core::errors::{DiagnoserError, DiagnoserResult};
pub use crate::core::guard::{CancellationRegistry, CancellationSubscription, PumpGuard};
pub use crate::core::types::{Bytes, Pid, Timestamp, TypeId};
pub use diagnoser::{
    AllocationAggregator, AllocationCounter, AllocationRow, BenchmarkCase, BenchmarkCaseId,
    CaseResult, DiagnoserActionParameters, DiagnoserConfig, DiagnoserController, DiagnoserState,
    HostSignal, MeasurementWindowGate, ProcessInfo, RunMode, UnavailableReason, WindowState,
};
pub use monitoring::{init_tracing, EventSourceHandle, Payload, TraceEvent, TypeRecord};
pub use session::{
    read_archive, EventArchive, EventInjector, Keywords, ProviderConfig, ProviderId,
    ProviderOptions, SimulationBackend, TraceBackend, TraceLevel, TracingSession,
};
