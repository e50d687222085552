/*!
 * Tracing Session Lifecycle
 *
 * Owns one OS tracing session: provider toggles, the blocking event pump,
 * and exactly-once release of the underlying resource.
 *
 * # Release semantics
 *
 * `close()` may be reached from three places: normal teardown, the
 * interrupt hook, and the pump thread after a stream fault. The release
 * mutex serializes them; only the first successful release touches the
 * OS resource and later calls are no-ops. The cancellation subscription is
 * dropped on every successful close, whichever path triggered it.
 */

use super::backend::{BackendSession, TraceBackend};
use crate::core::errors::{DiagnoserError, DiagnoserResult};
use crate::core::guard::{CancellationRegistry, CancellationSubscription};
use crate::core::limits::{DEFAULT_MAX_RELEASE_ATTEMPTS, RELEASE_RETRY_BACKOFF};
use crate::monitoring::streaming::EventSourceHandle;
use crate::session::provider::{ProviderConfig, ProviderId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

struct ReleaseState {
    released: bool,
    cancellation: Option<CancellationSubscription>,
}

struct SessionInner {
    name: String,
    backend: Arc<dyn BackendSession>,
    stream: EventSourceHandle,
    providers: Mutex<HashMap<ProviderId, ProviderConfig>>,
    release: Mutex<ReleaseState>,
    closed: AtomicBool,
    cancelled: AtomicBool,
    processing: AtomicBool,
    max_release_attempts: u32,
}

impl SessionInner {
    fn close(&self) -> DiagnoserResult<()> {
        self.release(false)
    }

    /// Release on behalf of an interrupt; counts as cancellation only if
    /// this call is the one that released the session
    fn close_cancelled(&self) {
        if let Err(e) = self.release(true) {
            error!(session = %self.name, error = %e, "close after interrupt failed");
        }
    }

    fn release(&self, cancelled: bool) -> DiagnoserResult<()> {
        let mut state = self.release.lock();
        if state.released {
            debug!(session = %self.name, "close on released session ignored");
            return Ok(());
        }

        let attempts = self.max_release_attempts.max(1);
        for attempt in 1..=attempts {
            match self.backend.release() {
                Ok(()) => {
                    state.released = true;
                    if cancelled {
                        self.cancelled.store(true, Ordering::Release);
                    }
                    self.closed.store(true, Ordering::Release);
                    // Hook is scoped to the open session
                    state.cancellation.take();
                    info!(session = %self.name, attempt, "tracing session closed");
                    return Ok(());
                }
                Err(e) => {
                    warn!(session = %self.name, attempt, error = %e, "failed to release tracing session");
                    if attempt < attempts {
                        std::thread::sleep(RELEASE_RETRY_BACKOFF);
                    }
                }
            }
        }

        error!(session = %self.name, attempts, "tracing session could not be released");
        Err(DiagnoserError::ResourceRelease {
            session: self.name.clone(),
            attempts,
        })
    }

    fn close_quietly(&self) {
        if let Err(e) = self.close() {
            error!(session = %self.name, error = %e, "close failed");
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let released = self.release.get_mut().released;
        if !released {
            warn!(session = %self.name, "tracing session dropped while open, releasing");
            self.close_quietly();
        }
    }
}

/// One OS tracing session tied to a benchmark case
pub struct TracingSession {
    inner: Arc<SessionInner>,
}

impl TracingSession {
    /// Create the OS session
    pub fn open(backend: &dyn TraceBackend, name: &str) -> DiagnoserResult<Self> {
        Self::open_with_attempts(backend, name, DEFAULT_MAX_RELEASE_ATTEMPTS)
    }

    /// Create the OS session with a custom release retry budget
    pub fn open_with_attempts(
        backend: &dyn TraceBackend,
        name: &str,
        max_release_attempts: u32,
    ) -> DiagnoserResult<Self> {
        let session = backend.create_session(name)?;
        info!(session = name, backend = backend.name(), "tracing session opened");

        Ok(Self {
            inner: Arc::new(SessionInner {
                name: name.to_string(),
                backend: session,
                stream: EventSourceHandle::new(),
                providers: Mutex::new(HashMap::new()),
                release: Mutex::new(ReleaseState {
                    released: false,
                    cancellation: None,
                }),
                closed: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                processing: AtomicBool::new(false),
                max_release_attempts,
            }),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Enable a provider; repeating an identical configuration is a no-op
    pub fn enable_provider(&self, config: ProviderConfig) -> DiagnoserResult<()> {
        if self.is_closed() {
            return Err(DiagnoserError::ProviderConfiguration {
                provider: config.provider.to_string(),
                reason: "session is closed".to_string(),
            });
        }

        let mut providers = self.inner.providers.lock();
        if providers.get(&config.provider) == Some(&config) {
            debug!(session = %self.inner.name, provider = %config.provider, "provider already enabled");
            return Ok(());
        }

        self.inner.backend.enable_provider(&config)?;
        info!(
            session = %self.inner.name,
            provider = %config.provider,
            level = ?config.level,
            keywords = config.keywords.bits(),
            "provider enabled"
        );
        providers.insert(config.provider, config);
        Ok(())
    }

    /// Stop a provider's events without closing the session
    pub fn disable_provider(&self, provider: ProviderId) -> DiagnoserResult<()> {
        let mut providers = self.inner.providers.lock();
        if providers.remove(&provider).is_none() {
            debug!(session = %self.inner.name, provider = %provider, "provider not enabled");
            return Ok(());
        }

        self.inner.backend.disable_provider(provider)?;
        info!(session = %self.inner.name, provider = %provider, "provider disabled");
        Ok(())
    }

    /// Whether a provider is currently enabled on this session
    pub fn is_enabled(&self, provider: ProviderId) -> bool {
        self.inner.providers.lock().contains_key(&provider)
    }

    /// Subscribable stream of this session's events
    #[inline]
    pub fn event_stream(&self) -> EventSourceHandle {
        self.inner.stream.clone()
    }

    /// Pump events to subscribers until the session is closed
    ///
    /// Blocks for the session's entire lifetime; run it on a dedicated thread.
    pub fn process(&self) -> DiagnoserResult<()> {
        self.inner.processing.store(true, Ordering::Release);
        debug!(session = %self.inner.name, "event pump started");

        let outcome = loop {
            match self.inner.backend.next_event() {
                Ok(Some(event)) => self.inner.stream.dispatch(&event),
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.inner.processing.store(false, Ordering::Release);
        match &outcome {
            Ok(()) => debug!(session = %self.inner.name, "event pump finished"),
            Err(e) => error!(session = %self.inner.name, error = %e, "event pump failed"),
        }
        outcome
    }

    /// Whether `process()` is currently running
    #[inline]
    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::Acquire)
    }

    /// Release the OS resource; safe to call any number of times
    pub fn close(&self) -> DiagnoserResult<()> {
        self.inner.close()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Whether the session was closed by an external interrupt
    #[inline]
    pub fn was_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cloneable handle that can close this session from another thread
    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Register an interrupt hook for as long as the session stays open
    pub fn register_cancellation(&self, registry: &CancellationRegistry) {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let subscription = registry.register(move || {
            if let Some(inner) = weak.upgrade() {
                warn!(session = %inner.name, "interrupt received, closing tracing session");
                inner.close_cancelled();
            }
        });

        let mut state = self.inner.release.lock();
        if state.released {
            // Already closed: the subscription drops right here
            return;
        }
        state.cancellation = Some(subscription);
    }
}

impl std::fmt::Debug for TracingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingSession")
            .field("name", &self.inner.name)
            .field("closed", &self.is_closed())
            .field("processing", &self.is_processing())
            .finish()
    }
}

/// Cross-thread close handle for a [`TracingSession`]
#[derive(Clone)]
pub struct SessionCloser {
    inner: Arc<SessionInner>,
}

impl SessionCloser {
    pub fn close(&self) -> DiagnoserResult<()> {
        self.inner.close()
    }

    /// Close and log instead of returning the error
    pub fn close_quietly(&self) {
        self.inner.close_quietly();
    }

    pub fn session_name(&self) -> &str {
        &self.inner.name
    }
}

impl std::fmt::Debug for SessionCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCloser")
            .field("session", &self.inner.name)
            .finish()
    }
}
