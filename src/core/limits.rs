/*!
 * Diagnoser Limits and Constants
 *
 * Centralized location for timing constants, naming conventions and
 * well-known identifiers used by the tracing session lifecycle.
 */

use std::time::Duration;

// =============================================================================
// SESSION LIFECYCLE
// =============================================================================

/// Delay before closing a session after the actual run (3s)
/// Real-time sessions deliver events with latency; this absorbs in-flight events
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Poll interval while waiting for the pump thread to start (10ms)
pub const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Number of attempts to release an OS tracing resource before giving up
pub const DEFAULT_MAX_RELEASE_ATTEMPTS: u32 = 3;

/// Backoff between failed release attempts
pub const RELEASE_RETRY_BACKOFF: Duration = Duration::from_millis(50);

// =============================================================================
// NAMING
// =============================================================================

/// Session name prefix for the allocation diagnoser
pub const DEFAULT_SESSION_PREFIX: &str = "Memory";

/// Identifier reported by the diagnoser
pub const DIAGNOSER_ID: &str = "DetailedMemoryDiagnoser";

/// Thread name prefix for the event pump
pub const PUMP_THREAD_PREFIX: &str = "trace-pump";

// =============================================================================
// EVENT DELIVERY
// =============================================================================

/// Placeholder prefix for types whose metadata never arrived
pub const UNKNOWN_TYPE_PREFIX: &str = "<unknown:";
