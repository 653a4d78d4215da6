//! Host-wide event bus
//!
//! Extensions subscribe during initialization and receive every event emitted
//! afterwards. Slow receivers lag rather than block emitters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Channel capacity for host events
const CHANNEL_CAPACITY: usize = 256;

/// A named event with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostEvent {
    /// Event name, e.g. `job.done`
    pub name: String,
    /// Event data
    pub payload: Value,
}

/// Broadcast channel shared by the host and its extensions
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HostEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default capacity
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Emit an event, returning how many subscribers will see it
    pub fn emit(&self, name: impl Into<String>, payload: Value) -> usize {
        let event = HostEvent {
            name: name.into(),
            payload,
        };
        // No subscribers is not an error
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        assert_eq!(bus.emit("job.done", json!({"id": 7})), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "job.done");
        assert_eq!(event.payload["id"], 7);
    }

    #[test]
    fn emit_without_subscribers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.emit("noop", Value::Null), 0);
    }
}
