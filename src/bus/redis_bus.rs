//! Redis pub/sub bus: outbound publisher and the resilient inbound subscriber.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::broadcast;

use super::{consumer::EventConsumer, topics, BusError, EventBus, EventEnvelope};

/// Reconnect backoff bounds in milliseconds
const BACKOFF_INITIAL_MS: u64 = 100;
const BACKOFF_MAX_MS: u64 = 30_000;
/// Jitter applied to each delay (fraction of the base delay)
const BACKOFF_JITTER: f64 = 0.1;

/// Exponential reconnect backoff with jitter.
struct ReconnectBackoff {
    current_ms: u64,
}

impl ReconnectBackoff {
    fn new() -> Self {
        Self {
            current_ms: BACKOFF_INITIAL_MS,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let base = (self.current_ms as f64 * 2.0).min(BACKOFF_MAX_MS as f64);
        let jitter_range = base * BACKOFF_JITTER;
        let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
        self.current_ms = (base + jitter).max(1.0) as u64;
        Duration::from_millis(self.current_ms)
    }

    fn reset(&mut self) {
        self.current_ms = BACKOFF_INITIAL_MS;
    }
}

/// Outbound publisher over Redis PUBLISH.
pub struct RedisBus {
    conn: ConnectionManager,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl EventBus for RedisBus {
    async fn publish(&self, topic: &str, envelope: EventEnvelope) -> Result<(), BusError> {
        let payload = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        let _: () = conn.publish(topic, payload).await?;
        Ok(())
    }
}

/// Inbound subscriber: listens on the upstream topics and feeds every message
/// to the [`EventConsumer`]. Connection loss is handled by reconnecting with
/// exponential backoff; a malformed message is logged and skipped.
pub struct RedisEventSubscriber {
    url: String,
    consumer: Arc<EventConsumer>,
    shutdown: broadcast::Sender<()>,
}

impl RedisEventSubscriber {
    pub fn new(url: String, consumer: Arc<EventConsumer>, shutdown: broadcast::Sender<()>) -> Self {
        Self {
            url,
            consumer,
            shutdown,
        }
    }

    fn subscribed_topics() -> [&'static str; 4] {
        [
            topics::PAYMENT_EVENTS,
            topics::USER_EVENTS,
            topics::TELEMATICS_EVENTS,
            topics::SUPPORT_EVENTS,
        ]
    }

    /// Run until shutdown is signalled.
    pub async fn run(&self) {
        let mut backoff = ReconnectBackoff::new();
        let mut shutdown = self.shutdown.subscribe();

        loop {
            match self.subscribe_and_listen(&mut shutdown, &mut backoff).await {
                Ok(()) => {
                    tracing::info!("Event subscriber shutting down");
                    return;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Event subscription lost, reconnecting"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.recv() => {
                            tracing::info!("Event subscriber shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn subscribe_and_listen(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
        backoff: &mut ReconnectBackoff,
    ) -> Result<(), BusError> {
        let client = redis::Client::open(self.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        for topic in Self::subscribed_topics() {
            pubsub.subscribe(topic).await?;
        }
        // Connection is healthy again
        backoff.reset();

        tracing::info!(topics = ?Self::subscribed_topics(), "Subscribed to upstream events");
        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                message = stream.next() => {
                    let Some(message) = message else {
                        return Err(BusError::Redis(redis::RedisError::from((
                            redis::ErrorKind::IoError,
                            "pub/sub stream closed",
                        ))));
                    };

                    let topic = message.get_channel_name().to_string();
                    let payload: String = match message.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::error!(topic = %topic, error = %e, "Unreadable event payload");
                            continue;
                        }
                    };

                    match serde_json::from_str::<EventEnvelope>(&payload) {
                        Ok(envelope) => self.consumer.handle(&topic, envelope).await,
                        Err(e) => {
                            tracing::error!(topic = %topic, error = %e, "Malformed event envelope");
                        }
                    }
                }
                _ = shutdown.recv() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut backoff = ReconnectBackoff::new();
        let first = backoff.next_delay();
        let second = backoff.next_delay();
        assert!(second > first);

        for _ in 0..20 {
            backoff.next_delay();
        }
        let capped = backoff.next_delay();
        let ceiling = BACKOFF_MAX_MS as f64 * (1.0 + BACKOFF_JITTER);
        assert!((capped.as_millis() as f64) <= ceiling);

        backoff.reset();
        assert!(backoff.next_delay() < capped);
    }
}
