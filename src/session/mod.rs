/*!
 * Tracing Sessions
 * OS tracing session lifecycle, providers and backends
 */

pub mod archive;
pub mod backend;
mod lifecycle;
pub mod provider;
pub mod simulation;

pub use archive::{read_archive, EventArchive};
pub use backend::{BackendSession, TraceBackend};
pub use lifecycle::{SessionCloser, TracingSession};
pub use provider::{Keywords, ProviderConfig, ProviderId, ProviderOptions, TraceLevel};
pub use simulation::{EventInjector, SimulationBackend};
