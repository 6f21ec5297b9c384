//! Pub/sub event bus.
//!
//! Upstream services publish domain events; this subsystem consumes them and
//! publishes its own. All publishes are one-way fire-and-forget: a delivery
//! failure is visible through the audit trail, never through the originating
//! transaction.

mod consumer;
mod memory;
mod redis_bus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use consumer::EventConsumer;
pub use memory::MemoryBus;
pub use redis_bus::{RedisBus, RedisEventSubscriber};

/// Topic names used on the bus.
pub mod topics {
    pub const PAYMENT_EVENTS: &str = "payment.events";
    pub const USER_EVENTS: &str = "user.events";
    pub const TELEMATICS_EVENTS: &str = "telematics.events";
    pub const SUPPORT_EVENTS: &str = "support.events";
}

/// Event names published by this subsystem.
pub mod events {
    pub const NOTIFICATION_SENT: &str = "notification.sent";
    pub const DELIVERY_TRACKED: &str = "notification.delivery.tracked";
    pub const TICKET_ROUTED: &str = "support.ticket.routed";
    pub const TICKET_CREATED: &str = "support.ticket.created";
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Wire envelope for every bus message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// One-way publisher.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, envelope: EventEnvelope) -> Result<(), BusError>;
}

/// Create the bus matching the configured broker backend.
pub async fn create_bus(
    kind: crate::config::QueueBackendKind,
    redis_url: &str,
) -> Result<std::sync::Arc<dyn EventBus>, BusError> {
    use crate::config::QueueBackendKind;

    match kind {
        QueueBackendKind::Memory => {
            tracing::info!("Using in-memory event bus");
            Ok(std::sync::Arc::new(MemoryBus::new()))
        }
        QueueBackendKind::Redis => {
            let bus = RedisBus::connect(redis_url).await?;
            tracing::info!("Using Redis event bus");
            Ok(std::sync::Arc::new(bus))
        }
    }
}
