//! Redis list-backed queue backend.
//!
//! Jobs are serialized as JSON onto a Redis list; consumers block-pop with a
//! short timeout so shutdown stays responsive. Redelivery on consumer crash is
//! the broker deployment's concern; duplicate deliveries are made harmless by
//! the store's idempotent upsert.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::NotificationJob;

use super::{JobQueueBackend, QueueBackendError};

/// BRPOP timeout in seconds
const POP_TIMEOUT_SECS: f64 = 1.0;

pub struct RedisQueueBackend {
    conn: ConnectionManager,
    key: String,
}

impl RedisQueueBackend {
    /// Connect to Redis and bind to the named queue.
    pub async fn connect(url: &str, queue_name: &str) -> Result<Self, QueueBackendError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            key: format!("jua:queue:{queue_name}"),
        })
    }
}

#[async_trait]
impl JobQueueBackend for RedisQueueBackend {
    async fn publish(&self, job: &NotificationJob) -> Result<(), QueueBackendError> {
        let payload = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.key, payload).await?;
        Ok(())
    }

    async fn next(&self) -> Result<Option<NotificationJob>, QueueBackendError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = conn.brpop(&self.key, POP_TIMEOUT_SECS).await?;

        match popped {
            Some((_, payload)) => match serde_json::from_str(&payload) {
                Ok(job) => Ok(Some(job)),
                Err(e) => {
                    // A malformed payload would otherwise wedge the consumer;
                    // drop it and surface the problem in the logs.
                    tracing::error!(error = %e, "Discarding malformed job payload");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn depth(&self) -> Result<usize, QueueBackendError> {
        let mut conn = self.conn.clone();
        let len: usize = conn.llen(&self.key).await?;
        Ok(len)
    }
}
