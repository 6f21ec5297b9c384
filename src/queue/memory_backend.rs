//! In-memory queue backend for tests and single-process deployments.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::NotificationJob;

use super::{JobQueueBackend, QueueBackendError};

/// Poll interval for `next` when the queue is empty
const EMPTY_POLL_MS: u64 = 250;

#[derive(Default)]
pub struct MemoryQueueBackend {
    jobs: Mutex<VecDeque<NotificationJob>>,
    notify: Notify,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueueBackend for MemoryQueueBackend {
    async fn publish(&self, job: &NotificationJob) -> Result<(), QueueBackendError> {
        self.jobs
            .lock()
            .expect("queue lock poisoned")
            .push_back(job.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn next(&self) -> Result<Option<NotificationJob>, QueueBackendError> {
        if let Some(job) = self.jobs.lock().expect("queue lock poisoned").pop_front() {
            return Ok(Some(job));
        }

        // Wait for a publish or give the caller a chance to observe shutdown
        let _ = tokio::time::timeout(
            Duration::from_millis(EMPTY_POLL_MS),
            self.notify.notified(),
        )
        .await;

        Ok(self.jobs.lock().expect("queue lock poisoned").pop_front())
    }

    async fn depth(&self) -> Result<usize, QueueBackendError> {
        Ok(self.jobs.lock().expect("queue lock poisoned").len())
    }
}
