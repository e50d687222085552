/*!
 * RAII Resource Guards
 *
 * Scoped guards for resources that must be released exactly once,
 * regardless of which code path ends their lifetime.
 *
 * ## Guard Types
 *
 * - **CancellationSubscription**: interrupt hook registered while a session is open
 * - **PumpGuard**: dedicated event-pump thread, joined on release
 *
 * ## Example
 *
 * ```ignore
 * let registry = CancellationRegistry::new();
 * let subscription = registry.register(move || closer.close_quietly());
 * // Hook is live while the session is open
 * drop(subscription); // Hook removed
 * ```
 */

mod cancellation;
mod pump;
mod traits;

pub use cancellation::{CancellationRegistry, CancellationSubscription, HookFn};
pub use pump::PumpGuard;
pub use traits::{Guard, GuardDrop};

pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("guard already released")]
    AlreadyReleased,

    /// The guarded thread or hook has not finished yet
    #[error("{0} is still running")]
    StillRunning(String),

    #[error("guard release failed: {0}")]
    OperationFailed(String),
}

/// Identity of a guard for log lines
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub created_at: std::time::Instant,
    pub label: Option<String>,
}

impl GuardMetadata {
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            created_at: std::time::Instant::now(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Time since the guard was created
    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.created_at.elapsed().as_micros() as u64
    }
}
