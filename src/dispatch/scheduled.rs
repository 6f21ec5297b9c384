//! Scheduled notification sweep.
//!
//! Jobs scheduled for the future are parked as pending rows by the worker;
//! this task re-publishes them onto the send queue once due. A compare-and-swap
//! guard keeps sweeps from overlapping when one run outlasts the interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::metrics;
use crate::queue::JobQueueBackend;
use crate::store::NotificationStore;

pub struct ScheduledDispatchTask {
    notifications: Arc<dyn NotificationStore>,
    queue: Arc<dyn JobQueueBackend>,
    interval: Duration,
    batch_size: usize,
    running: AtomicBool,
    shutdown: broadcast::Sender<()>,
}

impl ScheduledDispatchTask {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        queue: Arc<dyn JobQueueBackend>,
        interval: Duration,
        batch_size: usize,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            notifications,
            queue,
            interval,
            batch_size,
            running: AtomicBool::new(false),
            shutdown,
        }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = interval.tick() => self.sweep_once().await,
                _ = shutdown.recv() => {
                    tracing::info!("Scheduled dispatch task shutting down");
                    return;
                }
            }
        }
    }

    /// Re-publish due notifications, at most `batch_size` per run.
    pub async fn sweep_once(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics::DISPATCH_SWEEPS_SKIPPED_TOTAL.inc();
            tracing::debug!("Previous dispatch sweep still running, skipping");
            return;
        }

        let republished = self.republish_due().await;
        if republished > 0 {
            metrics::SCHEDULED_REPUBLISHED_TOTAL.inc_by(republished);
            tracing::info!(republished, "Re-published due scheduled notifications");
        }

        self.running.store(false, Ordering::Release);
    }

    async fn republish_due(&self) -> u64 {
        let due = match self
            .notifications
            .due_scheduled(Utc::now(), self.batch_size)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query due scheduled notifications");
                return 0;
            }
        };

        let mut republished = 0;
        for notification in due {
            match self.queue.publish(&notification.to_job()).await {
                Ok(()) => republished += 1,
                Err(e) => {
                    tracing::error!(
                        notification_id = %notification.id,
                        error = %e,
                        "Failed to re-publish scheduled notification"
                    );
                }
            }
        }
        republished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Channel, NotificationJob, Priority};
    use crate::queue::MemoryQueueBackend;
    use crate::store::MemoryStore;
    use chrono::Duration as ChronoDuration;

    fn task(
        store: Arc<MemoryStore>,
        queue: Arc<MemoryQueueBackend>,
        batch: usize,
    ) -> ScheduledDispatchTask {
        let (shutdown, _) = broadcast::channel(1);
        ScheduledDispatchTask::new(store, queue, Duration::from_secs(60), batch, shutdown)
    }

    async fn park(store: &MemoryStore, offset_minutes: i64, priority: Priority) -> uuid::Uuid {
        let mut job = NotificationJob::new("u-1", "payment_reminder", Channel::Sms);
        job.scheduled_for = Some(Utc::now() + ChronoDuration::minutes(offset_minutes));
        job.priority = priority;
        store.upsert_job(&job).await.unwrap();
        job.id
    }

    #[tokio::test]
    async fn test_sweep_republishes_only_due_jobs() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueueBackend::new());
        let task = task(store.clone(), queue.clone(), 50);

        let due = park(&store, -5, Priority::Normal).await;
        park(&store, 60, Priority::Normal).await;

        task.sweep_once().await;

        assert_eq!(queue.depth().await.unwrap(), 1);
        assert_eq!(queue.next().await.unwrap().unwrap().id, due);
    }

    #[tokio::test]
    async fn test_sweep_respects_batch_size_and_priority() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueueBackend::new());
        let task = task(store.clone(), queue.clone(), 1);

        park(&store, -10, Priority::Low).await;
        let high = park(&store, -5, Priority::High).await;

        task.sweep_once().await;

        assert_eq!(queue.depth().await.unwrap(), 1);
        assert_eq!(queue.next().await.unwrap().unwrap().id, high);
    }

    #[tokio::test]
    async fn test_guard_blocks_concurrent_sweep() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueueBackend::new());
        let task = task(store.clone(), queue.clone(), 50);
        park(&store, -5, Priority::Normal).await;

        // Simulate an in-flight sweep holding the guard
        task.running.store(true, Ordering::Release);
        task.sweep_once().await;
        assert_eq!(queue.depth().await.unwrap(), 0);

        // Released guard lets the next run proceed
        task.running.store(false, Ordering::Release);
        task.sweep_once().await;
        assert_eq!(queue.depth().await.unwrap(), 1);
    }
}
