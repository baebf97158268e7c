//! Event broadcaster — fans lifecycle events out to subscribers.
//!
//! The core never blocks on a broadcast: the bus sits on a bounded
//! `tokio::sync::broadcast` channel, so a slow subscriber lags and drops
//! events instead of applying backpressure to the deployer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Default bus capacity; beyond this the slowest subscriber starts losing
/// events.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEvent {
    pub event_type: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Publishes lifecycle events to subscribers. Implementations must not
/// block; dropping an event under backpressure is acceptable.
pub trait EventBroadcaster: Send + Sync {
    fn broadcast_graph_event(&self, event_type: &str, payload: Value);
}

/// Broadcast-channel-backed bus.
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster for EventBus {
    fn broadcast_graph_event(&self, event_type: &str, payload: Value) {
        let event = GraphEvent {
            event_type: event_type.to_string(),
            payload,
            timestamp: Utc::now(),
        };
        // send() only fails when no subscriber exists; events without an
        // audience are simply dropped.
        if self.sender.send(event).is_err() {
            trace!(event_type, "No subscribers, event dropped");
        }
    }
}

/// Discards everything; for callers that do not wire a bus.
pub struct NullBroadcaster;

impl EventBroadcaster for NullBroadcaster {
    fn broadcast_graph_event(&self, _event_type: &str, _payload: Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_in_source_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.broadcast_graph_event("deployment_started", json!({"stack": "web"}));
        bus.broadcast_graph_event("container_deployed", json!({"name": "db"}));

        assert_eq!(rx.recv().await.unwrap().event_type, "deployment_started");
        assert_eq!(rx.recv().await.unwrap().event_type, "container_deployed");
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_does_not_block() {
        let bus = EventBus::new();
        bus.broadcast_graph_event("noop", json!({}));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.broadcast_graph_event("tick", json!({"i": i}));
        }
        // The receiver lost the oldest events; the sender was never held up.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert!(missed >= 1),
            Ok(event) => panic!("expected lag, got {:?}", event),
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
}
