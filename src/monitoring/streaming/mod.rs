/*!
 * Event Streaming
 * Subscribable handle over a tracing session's live event stream
 *
 * Design: one producer (the session's pump thread), many synchronous
 * subscribers. Subscribers run on the pump thread, in registration order,
 * once per event, in delivery order.
 */

use crate::monitoring::events::TraceEvent;
use crate::session::provider::ProviderId;
use log::info;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Subscriber callback type
pub type SubscriberFn = Arc<dyn Fn(&TraceEvent) + Send + Sync>;

/// Identifier returned by [`EventSourceHandle::subscribe`]
pub type SubscriptionId = u64;

/// Which events a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionType {
    All,
    Provider(ProviderId),
}

impl SubscriptionType {
    #[inline]
    fn wants(&self, event: &TraceEvent) -> bool {
        match self {
            SubscriptionType::All => true,
            SubscriptionType::Provider(provider) => event.provider() == *provider,
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    kind: SubscriptionType,
    callback: SubscriberFn,
}

/// Stream statistics
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub events_dispatched: u64,
    pub active_subscribers: usize,
}

/// Subscribable event stream of one session
///
/// Subscriptions registered before the session starts pumping see every
/// event delivered after that point.
#[derive(Clone)]
pub struct EventSourceHandle {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    next_id: Arc<AtomicU64>,
    dispatched: Arc<AtomicU64>,
}

impl EventSourceHandle {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to every event on the stream
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TraceEvent) + Send + Sync + 'static,
    {
        self.register(SubscriptionType::All, Arc::new(callback))
    }

    /// Subscribe to events of a single provider
    pub fn subscribe_provider<F>(&self, provider: ProviderId, callback: F) -> SubscriptionId
    where
        F: Fn(&TraceEvent) + Send + Sync + 'static,
    {
        self.register(SubscriptionType::Provider(provider), Arc::new(callback))
    }

    fn register(&self, kind: SubscriptionType, callback: SubscriberFn) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.write().push(Subscription { id, kind, callback });
        info!("Registered stream subscriber {} ({:?})", id, kind);
        id
    }

    /// Remove a subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;
        if removed {
            info!("Unregistered stream subscriber {}", id);
        }
        removed
    }

    /// Invoke matching subscribers for one event
    ///
    /// Normally called only from the session's pump thread. Subscribers must
    /// not subscribe or unsubscribe from inside their callback.
    pub fn dispatch(&self, event: &TraceEvent) {
        let subscriptions = self.subscriptions.read();
        for subscription in subscriptions.iter() {
            if subscription.kind.wants(event) {
                (subscription.callback)(event);
            }
        }
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            events_dispatched: self.dispatched.load(Ordering::Relaxed),
            active_subscribers: self.subscriptions.read().len(),
        }
    }
}

impl Default for EventSourceHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventSourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourceHandle")
            .field("stats", &self.stats())
            .finish()
    }
}
