/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnoser error with miette diagnostics
///
/// Everything except [`DiagnoserError::ResourceRelease`] is local to one
/// benchmark case: the case is skipped and the run continues.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DiagnoserError {
    #[error("Failed to create tracing session '{session}': {reason}")]
    #[diagnostic(
        code(session::creation_failed),
        help("A session with this name may still be active, or the process lacks tracing privileges.")
    )]
    SessionCreation { session: String, reason: String },

    #[error("Provider '{provider}' rejected configuration: {reason}")]
    #[diagnostic(
        code(session::provider_rejected),
        help("Check the requested keywords and verbosity for this provider.")
    )]
    ProviderConfiguration { provider: String, reason: String },

    #[error("Event stream processing failed: {0}")]
    #[diagnostic(
        code(session::stream_fault),
        help("The session was closed and the case's results discarded.")
    )]
    StreamProcessingFault(String),

    #[error("Failed to release tracing session '{session}' after {attempts} attempts")]
    #[diagnostic(
        code(session::release_failed),
        help("The OS tracing resource may leak. Stop the session manually before running more cases.")
    )]
    ResourceRelease { session: String, attempts: u32 },

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(diagnoser::configuration_error),
        help("Review the MEMTRACE_* environment variables.")
    )]
    Configuration(String),

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(diagnoser::io_error),
        help("Filesystem operation failed. Check the archive path and permissions.")
    )]
    Io(String),
}

impl DiagnoserError {
    /// Fatal errors abort the run; all others only skip the current case
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, DiagnoserError::ResourceRelease { .. })
    }
}

impl From<std::io::Error> for DiagnoserError {
    fn from(err: std::io::Error) -> Self {
        DiagnoserError::Io(err.to_string())
    }
}

/// Result type for diagnoser operations
pub type DiagnoserResult<T> = Result<T, DiagnoserError>;
