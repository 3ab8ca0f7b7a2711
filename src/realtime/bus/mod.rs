//! In-process typed event bus with individual subscription handles.
//!
//! Every subscriber owns a queue and a kind filter. Publishing fans the event
//! out to matching subscribers; a closed queue is pruned on the next publish.
//! Dropping a [`Subscription`] or calling [`RealtimeBus::unsubscribe`] removes
//! exactly that subscriber and no other.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::events::{EventKind, RealtimeEvent};

/// Handle identifying one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    kind: EventKind,
    sender: mpsc::UnboundedSender<Arc<RealtimeEvent>>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
}

impl BusInner {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        self.subscribers().remove(&id).is_some()
    }
}

/// Cloneable handle to one shared bus.
#[derive(Clone, Default)]
pub struct RealtimeBus {
    inner: Arc<BusInner>,
}

impl RealtimeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for one event kind.
    pub fn subscribe(&self, kind: EventKind) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .subscribers()
            .insert(id, Subscriber { kind, sender });

        debug!(subscription = %id, kind = ?kind, "Subscribed");
        Subscription {
            id,
            kind,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove one subscriber. Returns `false` if the id is unknown or already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.remove(id);
        debug!(subscription = %id, removed, "Unsubscribed");
        removed
    }

    /// Deliver an event to every subscriber of its kind. Returns the number reached.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        let kind = event.kind();
        let event = Arc::new(event);
        let mut delivered = 0;

        self.inner.subscribers().retain(|id, subscriber| {
            if subscriber.kind != kind {
                return true;
            }
            match subscriber.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    trace!(subscription = %id, "Pruned closed subscriber");
                    false
                }
            }
        });

        trace!(kind = ?kind, delivered, "Published realtime event");
        delivered
    }

    /// Number of live subscribers for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .subscribers()
            .values()
            .filter(|s| s.kind == kind && !s.sender.is_closed())
            .count()
    }
}

/// One subscriber's queue. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    receiver: mpsc::UnboundedReceiver<Arc<RealtimeEvent>>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Next event, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Arc<RealtimeEvent>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<RealtimeEvent>> {
        self.receiver.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}
