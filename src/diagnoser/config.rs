/*!
 * Diagnoser Configuration
 *
 * Session naming, provider settings and teardown timing.
 */

use crate::core::errors::{DiagnoserError, DiagnoserResult};
use crate::core::limits::{
    DEFAULT_GRACE_PERIOD, DEFAULT_MAX_RELEASE_ATTEMPTS, DEFAULT_SESSION_PREFIX,
    STARTUP_POLL_INTERVAL,
};
use crate::session::provider::{Keywords, TraceLevel};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the grace period, in milliseconds
pub const ENV_GRACE_PERIOD_MS: &str = "MEMTRACE_GRACE_PERIOD_MS";
/// Environment variable overriding the session name prefix
pub const ENV_SESSION_PREFIX: &str = "MEMTRACE_SESSION_PREFIX";
/// Environment variable enabling the raw-event archive
pub const ENV_ARCHIVE_PATH: &str = "MEMTRACE_ARCHIVE_PATH";

/// Diagnoser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnoserConfig {
    /// Prefix of every session name (default: "Memory")
    pub session_name_prefix: String,

    /// Wait before closing the session after the actual run (default: 3s)
    pub grace_period: Duration,

    /// Poll interval while waiting for the pump thread to start (default: 10ms)
    pub startup_poll_interval: Duration,

    /// Keywords requested from the runtime provider
    pub allocation_keywords: Keywords,

    /// Verbosity requested from the runtime provider (default: Verbose)
    pub verbosity: TraceLevel,

    /// Collect call stacks with allocation samples
    pub stacks_enabled: bool,

    /// Also enable the kernel image-load provider
    pub enable_image_load: bool,

    /// Write every raw event to this file as JSON lines
    pub archive_path: Option<PathBuf>,

    /// Release attempts before giving up on a session (default: 3)
    pub max_release_attempts: u32,
}

impl DiagnoserConfig {
    pub fn new() -> Self {
        Self {
            session_name_prefix: DEFAULT_SESSION_PREFIX.to_string(),
            grace_period: DEFAULT_GRACE_PERIOD,
            startup_poll_interval: STARTUP_POLL_INTERVAL,
            allocation_keywords: Keywords::ALLOCATIONS,
            verbosity: TraceLevel::Verbose,
            stacks_enabled: true,
            enable_image_load: true,
            archive_path: None,
            max_release_attempts: DEFAULT_MAX_RELEASE_ATTEMPTS,
        }
    }

    /// Short timings for tests and replay
    pub fn for_tests() -> Self {
        Self::new()
            .with_grace_period(Duration::from_millis(20))
            .with_startup_poll_interval(Duration::from_millis(1))
    }

    /// Defaults overlaid with `MEMTRACE_*` environment variables
    pub fn from_env() -> DiagnoserResult<Self> {
        Self::new().overlay(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup
    pub fn overlay<F>(mut self, lookup: F) -> DiagnoserResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_GRACE_PERIOD_MS) {
            let millis = raw.trim().parse::<u64>().map_err(|e| {
                DiagnoserError::Configuration(format!(
                    "{} must be a whole number of milliseconds, got '{}': {}",
                    ENV_GRACE_PERIOD_MS, raw, e
                ))
            })?;
            self.grace_period = Duration::from_millis(millis);
        }

        if let Some(prefix) = lookup(ENV_SESSION_PREFIX) {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                return Err(DiagnoserError::Configuration(format!(
                    "{} must not be empty",
                    ENV_SESSION_PREFIX
                )));
            }
            self.session_name_prefix = prefix.to_string();
        }

        if let Some(path) = lookup(ENV_ARCHIVE_PATH) {
            if path.trim().is_empty() {
                return Err(DiagnoserError::Configuration(format!(
                    "{} must not be empty",
                    ENV_ARCHIVE_PATH
                )));
            }
            self.archive_path = Some(PathBuf::from(path));
        }

        Ok(self)
    }

    pub fn with_session_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_name_prefix = prefix.into();
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_startup_poll_interval(mut self, interval: Duration) -> Self {
        self.startup_poll_interval = interval;
        self
    }

    pub fn with_allocation_keywords(mut self, keywords: Keywords) -> Self {
        self.allocation_keywords = keywords;
        self
    }

    pub fn with_verbosity(mut self, verbosity: TraceLevel) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_stacks(mut self, enabled: bool) -> Self {
        self.stacks_enabled = enabled;
        self
    }

    pub fn with_image_load(mut self, enabled: bool) -> Self {
        self.enable_image_load = enabled;
        self
    }

    pub fn with_archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    pub fn with_max_release_attempts(mut self, attempts: u32) -> Self {
        self.max_release_attempts = attempts;
        self
    }
}

impl Default for DiagnoserConfig {
    fn default() -> Self {
        Self::new()
    }
}
