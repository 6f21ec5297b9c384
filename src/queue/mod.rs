//! Job queue for `notification.send`.
//!
//! Producers (event handlers, the scheduled sweep, the API) publish
//! [`NotificationJob`]s; the dispatch worker consumes them one at a time.
//! Horizontal scaling is multiple consumer instances, not intra-process
//! fan-out.

mod factory;
mod memory_backend;
mod redis_backend;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::NotificationJob;

pub use factory::create_queue;
pub use memory_backend::MemoryQueueBackend;
pub use redis_backend::RedisQueueBackend;

#[derive(Debug, Error)]
pub enum QueueBackendError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Backend trait for the notification job queue.
///
/// Implementations must be `Send + Sync`; they are shared between producer
/// tasks and the consumer loop.
#[async_trait]
pub trait JobQueueBackend: Send + Sync {
    /// Publish a job onto the queue.
    async fn publish(&self, job: &NotificationJob) -> Result<(), QueueBackendError>;

    /// Wait for the next job, returning `None` after a short poll interval so
    /// the consumer loop can observe shutdown.
    async fn next(&self) -> Result<Option<NotificationJob>, QueueBackendError>;

    /// Current queue depth.
    async fn depth(&self) -> Result<usize, QueueBackendError>;
}
