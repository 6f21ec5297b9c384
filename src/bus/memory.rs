//! In-memory bus backed by a broadcast channel.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{BusError, EventBus, EventEnvelope};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast-based bus for tests and single-process deployments. Publishing
/// with no subscribers is fine; events are simply dropped.
pub struct MemoryBus {
    sender: broadcast::Sender<(String, EventEnvelope)>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe to everything published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<(String, EventEnvelope)> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, topic: &str, envelope: EventEnvelope) -> Result<(), BusError> {
        let _ = self.sender.send((topic.to_string(), envelope));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = MemoryBus::new();
        let mut rx = bus.subscribe();

        bus.publish(
            "support.events",
            EventEnvelope::new("support.ticket.routed", json!({"ticketId": "t-1"})),
        )
        .await
        .unwrap();

        let (topic, envelope) = rx.recv().await.unwrap();
        assert_eq!(topic, "support.events");
        assert_eq!(envelope.event, "support.ticket.routed");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = MemoryBus::new();
        bus.publish("user.events", EventEnvelope::new("user.created", json!({})))
            .await
            .unwrap();
    }
}
