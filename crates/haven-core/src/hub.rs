//! Observer hub: the set of currently connected observers.
//!
//! The hub owns observer lifecycles; the router never holds a specific
//! observer and only broadcasts to "all currently connected". Delivery
//! runs over one unbounded channel per observer; an observer whose
//! receiving side is gone is removed from the active set by the broadcast
//! that discovers it, not retried.

use dashmap::DashMap;
use haven_protocol::ServerFrame;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Counter backing observer id generation.
static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(0);

/// Identifier of a connected observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// The set of connected observers and the broadcast fan-out.
#[derive(Debug, Default)]
pub struct ObserverHub {
    /// Delivery channels indexed by observer id.
    observers: DashMap<ObserverId, mpsc::UnboundedSender<Arc<ServerFrame>>>,
}

impl ObserverHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer.
    ///
    /// Returns the observer id and the receiving end of its delivery
    /// channel. Whether the observer sees broadcasts already in flight at
    /// connect time is unspecified.
    pub fn connect(&self) -> (ObserverId, mpsc::UnboundedReceiver<Arc<ServerFrame>>) {
        let id = ObserverId::next();
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.insert(id, tx);
        debug!(observer = %id, observers = self.observers.len(), "Observer connected");
        (id, rx)
    }

    /// Remove an observer from the active set.
    pub fn disconnect(&self, id: ObserverId) {
        if self.observers.remove(&id).is_some() {
            debug!(observer = %id, observers = self.observers.len(), "Observer disconnected");
        }
    }

    /// Number of currently connected observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Deliver a frame to every connected observer.
    ///
    /// Observers whose delivery channel is closed are dropped from the
    /// active set. Returns the number of observers that received the
    /// frame.
    pub fn broadcast(&self, frame: ServerFrame) -> usize {
        let event = frame.event_name();
        let frame = Arc::new(frame);
        let mut dead = Vec::new();
        let mut delivered = 0;

        for entry in self.observers.iter() {
            if entry.value().send(Arc::clone(&frame)).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        for id in dead {
            self.observers.remove(&id);
            debug!(observer = %id, "Dropped observer with closed delivery channel");
        }

        trace!(event, recipients = delivered, "Broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_protocol::AlertKind;
    use serde_json::json;

    #[test]
    fn test_connect_disconnect() {
        let hub = ObserverHub::new();

        let (id, _rx) = hub.connect();
        assert_eq!(hub.observer_count(), 1);

        hub.disconnect(id);
        assert_eq!(hub.observer_count(), 0);

        // Disconnecting twice is a no-op.
        hub.disconnect(id);
        assert_eq!(hub.observer_count(), 0);
    }

    #[test]
    fn test_broadcast_reaches_all_observers() {
        let hub = ObserverHub::new();
        let (_id1, mut rx1) = hub.connect();
        let (_id2, mut rx2) = hub.connect();

        let delivered = hub.broadcast(ServerFrame::status(json!({"temp": 21})));
        assert_eq!(delivered, 2);

        assert_eq!(rx1.try_recv().unwrap().event_name(), "status");
        assert_eq!(rx2.try_recv().unwrap().event_name(), "status");
    }

    #[test]
    fn test_broadcast_drops_dead_observers() {
        let hub = ObserverHub::new();
        let (_id1, mut rx1) = hub.connect();
        let (_id2, rx2) = hub.connect();
        drop(rx2);

        let delivered = hub.broadcast(ServerFrame::alert(AlertKind::Fall, json!({})));
        assert_eq!(delivered, 1);
        assert_eq!(hub.observer_count(), 1);
        assert!(rx1.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_to_empty_hub() {
        let hub = ObserverHub::new();
        assert_eq!(hub.broadcast(ServerFrame::status(json!({}))), 0);
    }
}
