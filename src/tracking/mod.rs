//! Delivery tracking and funnel analytics.
//!
//! Every genuine status advance produces exactly one immutable delivery
//! record. Funnel rates are scoped to the preceding stage: delivery rate is
//! delivered/sent, open rate is opened/delivered, click rate is
//! clicked/opened. A zero denominator yields a zero rate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::bus::{events, topics, EventBus, EventEnvelope};
use crate::domain::{Channel, DeliveryRecord, NotificationStatus};
use crate::metrics;
use crate::store::{AnalyticsFilter, NotificationStore, StoreError, TrackingStore};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Notification not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TrackingResult<T> = Result<T, TrackingError>;

/// Funnel analytics for one filter slice.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DeliveryAnalytics {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub failed: u64,
    /// delivered / sent
    pub delivery_rate: f64,
    /// opened / delivered
    pub open_rate: f64,
    /// clicked / opened
    pub click_rate: f64,
    pub total_cost: f64,
    pub average_cost: f64,
}

fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Records status transitions and serves analytics reads.
pub struct DeliveryTrackingService {
    notifications: Arc<dyn NotificationStore>,
    tracking: Arc<dyn TrackingStore>,
    bus: Arc<dyn EventBus>,
}

impl DeliveryTrackingService {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        tracking: Arc<dyn TrackingStore>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            notifications,
            tracking,
            bus,
        }
    }

    /// Record a status observation for a notification.
    ///
    /// Returns `Ok(true)` when the status actually advanced and a record was
    /// appended; `Ok(false)` when the observation was stale or duplicated and
    /// nothing changed. A webhook replaying `delivered` twice is therefore
    /// harmless.
    pub async fn track_delivery(
        &self,
        notification_id: Uuid,
        status: NotificationStatus,
        metadata: serde_json::Value,
    ) -> TrackingResult<bool> {
        let notification = self
            .notifications
            .get(notification_id)
            .await?
            .ok_or(TrackingError::NotFound(notification_id))?;

        let advanced = self.notifications.transition(notification_id, status).await?;
        if !advanced {
            tracing::debug!(
                notification_id = %notification_id,
                from = %notification.status,
                to = %status,
                "Ignoring stale delivery observation"
            );
            return Ok(false);
        }

        let record = DeliveryRecord::new(notification_id, notification.channel, status)
            .with_metadata(metadata);
        self.tracking.append(record).await?;
        metrics::DELIVERY_TRANSITIONS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();

        // Fire-and-forget; the record is already durable
        let envelope = EventEnvelope::new(
            events::DELIVERY_TRACKED,
            serde_json::json!({
                "notificationId": notification_id,
                "channel": notification.channel,
                "status": status,
            }),
        );
        if let Err(e) = self.bus.publish(topics::SUPPORT_EVENTS, envelope).await {
            tracing::warn!(error = %e, "Failed to publish delivery-tracked event");
        }

        tracing::info!(
            notification_id = %notification_id,
            channel = %notification.channel,
            status = %status,
            "Tracked delivery status"
        );
        Ok(true)
    }

    /// Tracking-pixel hit on an email.
    pub async fn track_email_open(&self, notification_id: Uuid) -> TrackingResult<bool> {
        self.track_delivery(
            notification_id,
            NotificationStatus::Opened,
            serde_json::json!({"source": "tracking_pixel"}),
        )
        .await
    }

    /// Link click-through.
    pub async fn track_click(&self, notification_id: Uuid) -> TrackingResult<bool> {
        self.track_delivery(
            notification_id,
            NotificationStatus::Clicked,
            serde_json::json!({"source": "link_redirect"}),
        )
        .await
    }

    pub async fn get_delivery_timeline(
        &self,
        notification_id: Uuid,
    ) -> TrackingResult<Vec<DeliveryRecord>> {
        Ok(self.tracking.timeline(notification_id).await?)
    }

    /// Aggregate funnel analytics for the filter slice.
    pub async fn get_analytics(
        &self,
        filter: &AnalyticsFilter,
    ) -> TrackingResult<DeliveryAnalytics> {
        let counts = self.tracking.funnel_counts(filter).await?;

        Ok(DeliveryAnalytics {
            sent: counts.sent,
            delivered: counts.delivered,
            opened: counts.opened,
            clicked: counts.clicked,
            failed: counts.failed,
            delivery_rate: rate(counts.delivered, counts.sent),
            open_rate: rate(counts.opened, counts.delivered),
            click_rate: rate(counts.clicked, counts.opened),
            total_cost: counts.total_cost,
            average_cost: if counts.cost_count == 0 {
                0.0
            } else {
                counts.total_cost / counts.cost_count as f64
            },
        })
    }

    /// Per-channel analytics, keyed by channel name. The `range` filter scopes
    /// every slice the same way; its `channel` field is ignored since each
    /// slice pins its own.
    pub async fn get_channel_performance(
        &self,
        range: &AnalyticsFilter,
    ) -> TrackingResult<HashMap<String, DeliveryAnalytics>> {
        let futures = Channel::all().map(|channel| {
            let filter = AnalyticsFilter {
                channel: Some(channel),
                ..range.clone()
            };
            async move { self.get_analytics(&filter).await }
        });

        let mut performance = HashMap::new();
        for (channel, result) in Channel::all().into_iter().zip(join_all(futures).await) {
            performance.insert(channel.as_str().to_string(), result?);
        }
        Ok(performance)
    }
}

/// Periodically deletes delivery records past the retention window. Parent
/// notification rows are kept.
pub struct RetentionTask {
    tracking: Arc<dyn TrackingStore>,
    retention: chrono::Duration,
    interval: Duration,
    shutdown: broadcast::Sender<()>,
}

impl RetentionTask {
    pub fn new(
        tracking: Arc<dyn TrackingStore>,
        retention_days: i64,
        interval: Duration,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            tracking,
            retention: chrono::Duration::days(retention_days),
            interval,
            shutdown,
        }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = interval.tick() => self.purge_once().await,
                _ = shutdown.recv() => {
                    tracing::info!("Retention task shutting down");
                    return;
                }
            }
        }
    }

    async fn purge_once(&self) {
        let cutoff = Utc::now() - self.retention;
        match self.tracking.purge_older_than(cutoff).await {
            Ok(0) => {}
            Ok(purged) => {
                metrics::RECORDS_PURGED_TOTAL.inc_by(purged);
                tracing::info!(purged, %cutoff, "Purged expired delivery records");
            }
            Err(e) => tracing::error!(error = %e, "Delivery record purge failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::domain::{Channel, NotificationJob};
    use crate::store::MemoryStore;

    fn service() -> (DeliveryTrackingService, Arc<MemoryStore>, Arc<MemoryBus>) {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(MemoryBus::new());
        let service = DeliveryTrackingService::new(store.clone(), store.clone(), bus.clone());
        (service, store, bus)
    }

    async fn seed_sent(store: &MemoryStore, channel: Channel) -> Uuid {
        let job = NotificationJob::new("u-1", "payment_reminder", channel);
        store.upsert_job(&job).await.unwrap();
        store
            .mark_sent(job.id, Some("ext-1".to_string()), Some(0.05))
            .await
            .unwrap();
        store
            .append(DeliveryRecord::new(job.id, channel, NotificationStatus::Sent))
            .await
            .unwrap();
        job.id
    }

    #[tokio::test]
    async fn test_track_advances_and_appends_once() {
        let (service, store, _bus) = service();
        let id = seed_sent(&store, Channel::Sms).await;

        assert!(service
            .track_delivery(id, NotificationStatus::Delivered, serde_json::Value::Null)
            .await
            .unwrap());

        // Replay is a no-op
        assert!(!service
            .track_delivery(id, NotificationStatus::Delivered, serde_json::Value::Null)
            .await
            .unwrap());

        let timeline = service.get_delivery_timeline(id).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].status, NotificationStatus::Delivered);
    }

    #[tokio::test]
    async fn test_track_publishes_event() {
        let (service, store, bus) = service();
        let id = seed_sent(&store, Channel::Email).await;
        let mut rx = bus.subscribe();

        service.track_email_open(id).await.unwrap();

        let (topic, envelope) = rx.recv().await.unwrap();
        assert_eq!(topic, topics::SUPPORT_EVENTS);
        assert_eq!(envelope.event, events::DELIVERY_TRACKED);
        assert_eq!(envelope.data["status"], "opened");
    }

    #[tokio::test]
    async fn test_unknown_notification_rejected() {
        let (service, _store, _bus) = service();
        let result = service.track_click(Uuid::new_v4()).await;
        assert!(matches!(result, Err(TrackingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_funnel_rates_scope_to_prior_stage() {
        let (service, store, _bus) = service();

        // 10 sent, 8 delivered, 4 opened, 1 clicked
        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(seed_sent(&store, Channel::Sms).await);
        }
        for id in ids.iter().take(8) {
            service
                .track_delivery(*id, NotificationStatus::Delivered, serde_json::Value::Null)
                .await
                .unwrap();
        }
        for id in ids.iter().take(4) {
            service.track_email_open(*id).await.unwrap();
        }
        service.track_click(ids[0]).await.unwrap();

        let analytics = service.get_analytics(&AnalyticsFilter::default()).await.unwrap();
        assert_eq!(analytics.sent, 10);
        assert_eq!(analytics.delivered, 8);
        assert_eq!(analytics.opened, 4);
        assert_eq!(analytics.clicked, 1);
        assert!((analytics.delivery_rate - 0.8).abs() < 1e-9);
        assert!((analytics.open_rate - 0.5).abs() < 1e-9);
        assert!((analytics.click_rate - 0.25).abs() < 1e-9);
        assert!((analytics.average_cost - 0.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_slice_has_zero_rates() {
        let (service, _store, _bus) = service();
        let analytics = service.get_analytics(&AnalyticsFilter::default()).await.unwrap();
        assert_eq!(analytics.delivery_rate, 0.0);
        assert_eq!(analytics.open_rate, 0.0);
        assert_eq!(analytics.average_cost, 0.0);
    }

    #[tokio::test]
    async fn test_channel_performance_splits_by_channel() {
        let (service, store, _bus) = service();
        let sms = seed_sent(&store, Channel::Sms).await;
        seed_sent(&store, Channel::Email).await;
        service
            .track_delivery(sms, NotificationStatus::Delivered, serde_json::Value::Null)
            .await
            .unwrap();

        let perf = service
            .get_channel_performance(&AnalyticsFilter::default())
            .await
            .unwrap();
        assert_eq!(perf["sms"].sent, 1);
        assert_eq!(perf["sms"].delivered, 1);
        assert_eq!(perf["email"].sent, 1);
        assert_eq!(perf["email"].delivered, 0);
        assert_eq!(perf["whatsapp"].sent, 0);
    }

    #[tokio::test]
    async fn test_channel_performance_honours_date_range() {
        let (service, store, _bus) = service();
        seed_sent(&store, Channel::Sms).await;

        let past = AnalyticsFilter {
            to: Some(Utc::now() - chrono::Duration::hours(1)),
            ..Default::default()
        };
        let perf = service.get_channel_performance(&past).await.unwrap();
        assert_eq!(perf["sms"].sent, 0);

        let recent = AnalyticsFilter {
            from: Some(Utc::now() - chrono::Duration::hours(1)),
            ..Default::default()
        };
        let perf = service.get_channel_performance(&recent).await.unwrap();
        assert_eq!(perf["sms"].sent, 1);

        // A channel in the range is ignored; every slice pins its own
        let skewed = AnalyticsFilter::for_channel(Channel::Email);
        let perf = service.get_channel_performance(&skewed).await.unwrap();
        assert_eq!(perf["sms"].sent, 1);
        assert_eq!(perf["email"].sent, 0);
    }
}
