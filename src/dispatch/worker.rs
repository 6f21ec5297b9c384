//! Queue consumer: turns `NotificationJob`s into provider sends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::bus::{events, topics, EventBus, EventEnvelope};
use crate::crypto::RecipientCipher;
use crate::domain::{DeliveryRecord, NotificationJob, NotificationStatus};
use crate::metrics;
use crate::provider::{ChannelProvider, ProviderError, ProviderRegistry, SendRequest};
use crate::queue::JobQueueBackend;
use crate::store::{NotificationStore, TrackingStore};
use crate::template::{RenderedMessage, TemplateStore};

use super::DispatchError;

/// What happened to one consumed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Sent,
    Failed(String),
    /// Parked as a pending row; the scheduled sweep re-publishes it when due.
    Scheduled,
    /// The row had already advanced past pending; redelivery ignored.
    Duplicate,
}

impl JobOutcome {
    fn label(&self) -> &'static str {
        match self {
            JobOutcome::Sent => "sent",
            JobOutcome::Failed(_) => "failed",
            JobOutcome::Scheduled => "scheduled",
            JobOutcome::Duplicate => "duplicate",
        }
    }
}

pub struct NotificationWorker {
    queue: Arc<dyn JobQueueBackend>,
    notifications: Arc<dyn NotificationStore>,
    tracking: Arc<dyn TrackingStore>,
    templates: Arc<TemplateStore>,
    providers: Arc<ProviderRegistry>,
    cipher: Arc<RecipientCipher>,
    bus: Arc<dyn EventBus>,
    send_timeout: Duration,
    shutdown: broadcast::Sender<()>,
}

impl NotificationWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn JobQueueBackend>,
        notifications: Arc<dyn NotificationStore>,
        tracking: Arc<dyn TrackingStore>,
        templates: Arc<TemplateStore>,
        providers: Arc<ProviderRegistry>,
        cipher: Arc<RecipientCipher>,
        bus: Arc<dyn EventBus>,
        send_timeout: Duration,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            queue,
            notifications,
            tracking,
            templates,
            providers,
            cipher,
            bus,
            send_timeout,
            shutdown,
        }
    }

    /// Consume jobs until shutdown is signalled.
    pub async fn run(&self) {
        tracing::info!("Notification worker started");
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                next = self.queue.next() => match next {
                    Ok(Some(job)) => {
                        let id = job.id;
                        let channel = job.channel;
                        match self.process_job(job).await {
                            Ok(outcome) => {
                                metrics::NOTIFICATIONS_PROCESSED_TOTAL
                                    .with_label_values(&[channel.as_str(), outcome.label()])
                                    .inc();
                            }
                            Err(e) => {
                                tracing::error!(notification_id = %id, error = %e, "Job processing failed");
                            }
                        }
                    }
                    Ok(None) => {
                        if let Ok(depth) = self.queue.depth().await {
                            metrics::QUEUE_DEPTH.set(depth as i64);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Queue read failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Notification worker shutting down");
                    return;
                }
            }
        }
    }

    /// Run one job through the pipeline: persist, gate on schedule, decrypt,
    /// render, send, record.
    pub async fn process_job(&self, job: NotificationJob) -> Result<JobOutcome, DispatchError> {
        let notification = self.notifications.upsert_job(&job).await?;
        if notification.status != NotificationStatus::Pending {
            tracing::debug!(
                notification_id = %job.id,
                status = %notification.status,
                terminal = notification.status.is_terminal(),
                "Skipping redelivered job"
            );
            return Ok(JobOutcome::Duplicate);
        }

        if job.is_scheduled_after(Utc::now()) {
            tracing::debug!(
                notification_id = %job.id,
                scheduled_for = ?job.scheduled_for,
                "Parking scheduled notification"
            );
            return Ok(JobOutcome::Scheduled);
        }

        let recipient = match self.cipher.decrypt(&job.recipient) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                return self
                    .fail(&job, &format!("recipient decryption failed: {e}"))
                    .await;
            }
        };

        let rendered = match self.resolve_content(&job) {
            Ok(rendered) => rendered,
            Err(reason) => return self.fail(&job, &reason).await,
        };

        let Some(provider) = self.providers.for_channel(job.channel) else {
            return self
                .fail(&job, &format!("no provider for channel {}", job.channel))
                .await;
        };

        let request = SendRequest {
            notification_id: job.id,
            recipient,
            subject: rendered.subject,
            body: rendered.body,
        };

        let timer = metrics::PROVIDER_SEND_SECONDS
            .with_label_values(&[job.channel.as_str()])
            .start_timer();
        let send = tokio::time::timeout(self.send_timeout, provider.send(&request)).await;
        timer.observe_duration();

        match send {
            Ok(Ok(outcome)) if outcome.success => {
                self.notifications
                    .mark_sent(job.id, outcome.external_id.clone(), outcome.cost)
                    .await?;

                let record = DeliveryRecord::new(job.id, job.channel, NotificationStatus::Sent)
                    .with_metadata(serde_json::json!({
                        "externalId": outcome.external_id,
                        "cost": outcome.cost,
                    }));
                self.tracking.append(record).await?;
                metrics::DELIVERY_TRANSITIONS_TOTAL
                    .with_label_values(&["sent"])
                    .inc();

                let envelope = EventEnvelope::new(
                    events::NOTIFICATION_SENT,
                    serde_json::json!({
                        "notificationId": job.id,
                        "userId": job.user_id,
                        "channel": job.channel,
                        "externalId": outcome.external_id,
                    }),
                );
                if let Err(e) = self.bus.publish(topics::SUPPORT_EVENTS, envelope).await {
                    tracing::warn!(error = %e, "Failed to publish notification-sent event");
                }

                tracing::info!(
                    notification_id = %job.id,
                    channel = %job.channel,
                    "Notification sent"
                );
                Ok(JobOutcome::Sent)
            }
            Ok(Ok(outcome)) => {
                let reason = outcome
                    .message
                    .unwrap_or_else(|| "provider rejected message".to_string());
                self.fail(&job, &reason).await
            }
            Ok(Err(ProviderError::InvalidRecipient { reason, .. })) => {
                self.fail(&job, &format!("invalid recipient: {reason}")).await
            }
            Err(_) => {
                self.fail(
                    &job,
                    &format!("provider timed out after {:?}", self.send_timeout),
                )
                .await
            }
        }
    }

    fn resolve_content(&self, job: &NotificationJob) -> Result<RenderedMessage, String> {
        if let Some(ref template_id) = job.template_id {
            let empty = HashMap::new();
            let variables = job.template_variables.as_ref().unwrap_or(&empty);
            return self
                .templates
                .render(template_id, job.channel, variables)
                .map_err(|e| e.to_string());
        }

        match &job.message {
            Some(body) => Ok(RenderedMessage {
                subject: job.subject.clone(),
                body: body.clone(),
            }),
            None => Err("job carries neither template nor message body".to_string()),
        }
    }

    async fn fail(&self, job: &NotificationJob, reason: &str) -> Result<JobOutcome, DispatchError> {
        let advanced = self.notifications.mark_failed(job.id, reason).await?;
        if advanced {
            let record = DeliveryRecord::new(job.id, job.channel, NotificationStatus::Failed)
                .with_metadata(serde_json::json!({"error": reason}));
            self.tracking.append(record).await?;
            metrics::DELIVERY_TRANSITIONS_TOTAL
                .with_label_values(&["failed"])
                .inc();
        }

        tracing::warn!(
            notification_id = %job.id,
            channel = %job.channel,
            reason,
            "Notification failed"
        );
        Ok(JobOutcome::Failed(reason.to_string()))
    }
}
