/*!
 * Tracing Backend Traits
 * Platform-agnostic abstractions over the OS tracing subsystem
 */

use crate::core::errors::DiagnoserResult;
use crate::monitoring::events::TraceEvent;
use crate::session::provider::{ProviderConfig, ProviderId};
use std::sync::Arc;

/// OS tracing subsystem interface
pub trait TraceBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Create a named real-time session
    ///
    /// Fails with `SessionCreation` on a name collision or missing privilege.
    fn create_session(&self, name: &str) -> DiagnoserResult<Arc<dyn BackendSession>>;
}

/// One OS-level tracing session
///
/// The pump thread blocks in [`BackendSession::next_event`] while the caller
/// thread enables providers and eventually releases the session, so every
/// method takes `&self`.
pub trait BackendSession: Send + Sync {
    /// Session name as registered with the OS
    fn name(&self) -> &str;

    /// Start (or reconfigure) delivery for a provider
    fn enable_provider(&self, config: &ProviderConfig) -> DiagnoserResult<()>;

    /// Stop delivery for a provider without closing the session
    fn disable_provider(&self, provider: ProviderId) -> DiagnoserResult<()>;

    /// Block until the next event arrives
    ///
    /// Returns `Ok(None)` once the session has been released and every
    /// already-delivered event has been handed out.
    fn next_event(&self) -> DiagnoserResult<Option<TraceEvent>>;

    /// Release the OS resource, unblocking `next_event`
    fn release(&self) -> DiagnoserResult<()>;
}
