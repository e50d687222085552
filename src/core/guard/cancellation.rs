/*!
 * Cancellation Hooks
 *
 * Interrupt hooks that are only registered while a tracing session is open.
 * A subscription guard removes its hook on release or drop, so a hook can
 * never outlive the session it closes.
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cancellation hook callback type
pub type HookFn = Arc<dyn Fn() + Send + Sync>;

/// Registry of interrupt hooks
///
/// Cloning shares the registry. The replay binary wires the process's
/// Ctrl+C handler to [`CancellationRegistry::trigger`].
#[derive(Clone)]
pub struct CancellationRegistry {
    hooks: Arc<DashMap<u64, HookFn, RandomState>>,
    next_id: Arc<AtomicU64>,
    triggered: Arc<AtomicU64>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            hooks: Arc::new(DashMap::with_hasher(RandomState::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            triggered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a hook; it stays registered until the returned guard is released
    #[must_use = "dropping the subscription immediately unregisters the hook"]
    pub fn register<F>(&self, hook: F) -> CancellationSubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.hooks.insert(id, Arc::new(hook));
        debug!("Registered cancellation hook {}", id);

        CancellationSubscription {
            registry: self.clone(),
            id,
            metadata: GuardMetadata::new("cancellation_hook"),
            active: true,
        }
    }

    /// Run every registered hook (external interrupt)
    ///
    /// Hooks are snapshotted first so a hook may drop its own subscription.
    pub fn trigger(&self) -> usize {
        let hooks: Vec<HookFn> = self
            .hooks
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        self.triggered.fetch_add(1, Ordering::SeqCst);
        if hooks.is_empty() {
            info!("Interrupt received with no active tracing session");
        } else {
            warn!("Interrupt received, running {} cancellation hook(s)", hooks.len());
        }

        for hook in &hooks {
            hook();
        }
        hooks.len()
    }

    fn unregister(&self, id: u64) -> bool {
        let removed = self.hooks.remove(&id).is_some();
        if removed {
            debug!("Unregistered cancellation hook {}", id);
        }
        removed
    }

    /// Number of live hooks
    pub fn count(&self) -> usize {
        self.hooks.len()
    }

    /// Number of times the registry was triggered
    pub fn trigger_count(&self) -> u64 {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistry")
            .field("hooks", &self.hooks.len())
            .field("triggered", &self.trigger_count())
            .finish()
    }
}

/// Scoped registration of one cancellation hook
pub struct CancellationSubscription {
    registry: CancellationRegistry,
    id: u64,
    metadata: GuardMetadata,
    active: bool,
}

impl CancellationSubscription {
    /// Hook identifier within the registry
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Guard for CancellationSubscription {
    fn resource_type(&self) -> &'static str {
        "cancellation_hook"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn release(&mut self) -> GuardResult<()> {
        if !self.active {
            return Err(GuardError::AlreadyReleased);
        }
        self.active = false;
        self.registry.unregister(self.id);
        Ok(())
    }
}

impl GuardDrop for CancellationSubscription {
    fn on_drop(&mut self) {
        if self.active {
            let _ = self.release();
        }
    }
}

impl Drop for CancellationSubscription {
    fn drop(&mut self) {
        self.on_drop();
    }
}

impl std::fmt::Debug for CancellationSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSubscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
