/*!
 * Simulation Tracing Backend
 * In-memory tracing subsystem for tests, replay and unsupported platforms
 */

use super::backend::{BackendSession, TraceBackend};
use crate::core::errors::{DiagnoserError, DiagnoserResult};
use crate::monitoring::events::TraceEvent;
use crate::session::provider::{ProviderConfig, ProviderId};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use flume::{Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Item travelling through a simulated session's delivery channel
enum Delivery {
    Event(TraceEvent),
    Fault(String),
}

/// Shared state of one simulated session
struct SimSession {
    name: String,
    enabled: RwLock<HashMap<ProviderId, ProviderConfig>>,
    sender: Mutex<Option<Sender<Delivery>>>,
    receiver: Receiver<Delivery>,
    enable_calls: AtomicU64,
    delivered: AtomicU64,
    filtered: AtomicU64,
}

impl SimSession {
    fn new(name: &str) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            name: name.to_string(),
            enabled: RwLock::new(HashMap::new()),
            sender: Mutex::new(Some(sender)),
            receiver,
            enable_calls: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
        }
    }

    /// Apply provider, level, keyword and process filters
    fn admits(&self, event: &TraceEvent) -> bool {
        let enabled = self.enabled.read();
        let config = match enabled.get(&event.provider()) {
            Some(config) => config,
            None => return false,
        };

        if event.payload.level() > config.level {
            return false;
        }

        let required = event.payload.keywords();
        if !required.is_empty() && !config.keywords.intersects(required) {
            return false;
        }

        config.options.admits(event.process_name.as_deref())
    }

    fn push(&self, delivery: Delivery) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(delivery).is_ok(),
            None => false,
        }
    }
}

/// Backend-wide state
struct BackendState {
    sessions: DashMap<String, Arc<SimSession>, RandomState>,
    releases: DashMap<String, u64, RandomState>,
    rejected: DashMap<ProviderId, String, RandomState>,
    privileged: AtomicBool,
    pending_release_failures: AtomicU32,
    created: AtomicU64,
}

/// Simulation-based tracing backend
#[derive(Clone)]
pub struct SimulationBackend {
    state: Arc<BackendState>,
}

impl SimulationBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BackendState {
                sessions: DashMap::with_hasher(RandomState::new()),
                releases: DashMap::with_hasher(RandomState::new()),
                rejected: DashMap::with_hasher(RandomState::new()),
                privileged: AtomicBool::new(true),
                pending_release_failures: AtomicU32::new(0),
                created: AtomicU64::new(0),
            }),
        }
    }

    /// Simulate a caller without tracing privileges
    pub fn without_privilege() -> Self {
        let backend = Self::new();
        backend.state.privileged.store(false, Ordering::SeqCst);
        backend
    }

    /// Make every enable of `provider` fail
    pub fn reject_provider(&self, provider: ProviderId, reason: impl Into<String>) {
        self.state.rejected.insert(provider, reason.into());
    }

    /// Make the next `count` release attempts fail
    pub fn fail_next_releases(&self, count: u32) {
        self.state
            .pending_release_failures
            .store(count, Ordering::SeqCst);
    }

    /// Handle for emitting events into an active session
    pub fn injector(&self, session: &str) -> Option<EventInjector> {
        self.state
            .sessions
            .get(session)
            .map(|entry| EventInjector {
                session: Arc::clone(entry.value()),
            })
    }

    /// Whether a session with this name currently holds an OS resource
    pub fn is_active(&self, session: &str) -> bool {
        self.state.sessions.contains_key(session)
    }

    /// Number of successful releases for a session name
    pub fn release_count(&self, session: &str) -> u64 {
        self.state
            .releases
            .get(session)
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }

    /// Number of sessions created over the backend's lifetime
    pub fn sessions_created(&self) -> u64 {
        self.state.created.load(Ordering::SeqCst)
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulationBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationBackend")
            .field("active_sessions", &self.state.sessions.len())
            .field("sessions_created", &self.sessions_created())
            .finish()
    }
}

impl TraceBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn create_session(&self, name: &str) -> DiagnoserResult<Arc<dyn BackendSession>> {
        if !self.state.privileged.load(Ordering::SeqCst) {
            return Err(DiagnoserError::SessionCreation {
                session: name.to_string(),
                reason: "access denied: tracing sessions require elevated privileges".to_string(),
            });
        }

        let session = match self.state.sessions.entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(DiagnoserError::SessionCreation {
                    session: name.to_string(),
                    reason: "a session with this name is already active".to_string(),
                });
            }
            Entry::Vacant(vacant) => {
                let session = Arc::new(SimSession::new(name));
                vacant.insert(Arc::clone(&session));
                session
            }
        };

        self.state.created.fetch_add(1, Ordering::SeqCst);
        info!("Simulated tracing session '{}' created", name);

        Ok(Arc::new(SimulatedSession {
            session,
            backend: Arc::clone(&self.state),
        }))
    }
}

/// Backend session handed to [`crate::session::TracingSession`]
struct SimulatedSession {
    session: Arc<SimSession>,
    backend: Arc<BackendState>,
}

impl BackendSession for SimulatedSession {
    fn name(&self) -> &str {
        &self.session.name
    }

    fn enable_provider(&self, config: &ProviderConfig) -> DiagnoserResult<()> {
        if let Some(reason) = self.backend.rejected.get(&config.provider) {
            return Err(DiagnoserError::ProviderConfiguration {
                provider: config.provider.to_string(),
                reason: reason.value().clone(),
            });
        }
        if config.keywords.is_empty() {
            return Err(DiagnoserError::ProviderConfiguration {
                provider: config.provider.to_string(),
                reason: "empty keyword mask".to_string(),
            });
        }

        self.session.enable_calls.fetch_add(1, Ordering::SeqCst);
        self.session
            .enabled
            .write()
            .insert(config.provider, config.clone());
        debug!(
            "Session '{}' enabled {} at {:?} (keywords {:#x})",
            self.session.name,
            config.provider,
            config.level,
            config.keywords.bits()
        );
        Ok(())
    }

    fn disable_provider(&self, provider: ProviderId) -> DiagnoserResult<()> {
        self.session.enabled.write().remove(&provider);
        debug!("Session '{}' disabled {}", self.session.name, provider);
        Ok(())
    }

    fn next_event(&self) -> DiagnoserResult<Option<TraceEvent>> {
        match self.session.receiver.recv() {
            Ok(Delivery::Event(event)) => Ok(Some(event)),
            Ok(Delivery::Fault(reason)) => Err(DiagnoserError::StreamProcessingFault(reason)),
            Err(flume::RecvError::Disconnected) => Ok(None),
        }
    }

    fn release(&self) -> DiagnoserResult<()> {
        let pending = &self.backend.pending_release_failures;
        if pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            warn!("Simulated release failure for session '{}'", self.session.name);
            return Err(DiagnoserError::Io(format!(
                "simulated failure releasing '{}'",
                self.session.name
            )));
        }

        // Dropping the sender disconnects the channel once buffered events drain
        self.session.sender.lock().take();
        self.session.enabled.write().clear();
        self.backend.sessions.remove(&self.session.name);
        *self
            .backend
            .releases
            .entry(self.session.name.clone())
            .or_insert(0) += 1;
        info!("Simulated tracing session '{}' released", self.session.name);
        Ok(())
    }
}

/// Emits events into a simulated session, as the traced process would
#[derive(Clone)]
pub struct EventInjector {
    session: Arc<SimSession>,
}

impl EventInjector {
    /// Emit one event; returns false if it was filtered out or the session is closed
    pub fn emit(&self, event: TraceEvent) -> bool {
        if !self.session.admits(&event) {
            self.session.filtered.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let delivered = self.session.push(Delivery::Event(event));
        if delivered {
            self.session.delivered.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Emit a sequence of events, returning how many were delivered
    pub fn emit_all<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        events
            .into_iter()
            .map(|event| self.emit(event))
            .filter(|delivered| *delivered)
            .count()
    }

    /// Make the session's blocking read fail
    pub fn fault(&self, reason: impl Into<String>) -> bool {
        self.session.push(Delivery::Fault(reason.into()))
    }

    /// Whether a provider is currently enabled
    pub fn is_enabled(&self, provider: ProviderId) -> bool {
        self.session.enabled.read().contains_key(&provider)
    }

    /// Number of enable calls that reached the subsystem
    pub fn enable_calls(&self) -> u64 {
        self.session.enable_calls.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> u64 {
        self.session.delivered.load(Ordering::Relaxed)
    }

    pub fn filtered(&self) -> u64 {
        self.session.filtered.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventInjector")
            .field("session", &self.session.name)
            .field("delivered", &self.delivered())
            .finish()
    }
}
