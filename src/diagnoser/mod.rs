/*!
 * Allocation Diagnoser
 * Per-case allocation profiling driven by harness host signals
 */

pub mod aggregator;
pub mod config;
mod controller;
pub mod gate;
mod handlers;
pub mod results;
pub mod signals;
pub mod state;

pub use aggregator::{unknown_type_name, AllocationAggregator, AllocationCounter};
pub use config::DiagnoserConfig;
pub use controller::DiagnoserController;
pub use gate::{MeasurementWindowGate, WindowState};
pub use handlers::{attach_allocation_handlers, HandlerSubscriptions};
pub use results::{AllocationRow, CaseResult, ResultsTable, UnavailableReason};
pub use signals::{
    BenchmarkCase, BenchmarkCaseId, DiagnoserActionParameters, HostSignal, ProcessInfo, RunMode,
};
pub use state::DiagnoserState;
