//! Queue factory.

use std::sync::Arc;

use crate::config::{QueueBackendKind, QueueConfig};

use super::{JobQueueBackend, MemoryQueueBackend, QueueBackendError, RedisQueueBackend};

/// Create the configured queue backend.
pub async fn create_queue(
    config: &QueueConfig,
    redis_url: &str,
) -> Result<Arc<dyn JobQueueBackend>, QueueBackendError> {
    match config.backend {
        QueueBackendKind::Memory => {
            tracing::info!(queue = %config.name, "Using in-memory queue backend");
            Ok(Arc::new(MemoryQueueBackend::new()))
        }
        QueueBackendKind::Redis => {
            let backend = RedisQueueBackend::connect(redis_url, &config.name).await?;
            tracing::info!(queue = %config.name, "Using Redis queue backend");
            Ok(Arc::new(backend))
        }
    }
}
