//! Notification job and lifecycle types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
    Whatsapp,
}

impl Channel {
    /// All supported channels, in analytics ordering
    pub fn all() -> [Channel; 3] {
        [Channel::Sms, Channel::Email, Channel::Whatsapp]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
            Channel::Whatsapp => "whatsapp",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority levels for notification jobs.
///
/// Ordering is derived so that a descending sort yields High > Normal > Low,
/// which the scheduled sweep relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Lifecycle status of a notification.
///
/// Statuses advance monotonically through the delivery funnel:
/// pending -> sent -> delivered -> opened -> clicked. `Failed` is terminal and
/// reachable only from `Pending` or `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Delivered,
    Opened,
    Clicked,
    Failed,
}

impl NotificationStatus {
    /// Position in the delivery funnel; `Failed` sits outside it.
    fn funnel_rank(&self) -> Option<u8> {
        match self {
            NotificationStatus::Pending => Some(0),
            NotificationStatus::Sent => Some(1),
            NotificationStatus::Delivered => Some(2),
            NotificationStatus::Opened => Some(3),
            NotificationStatus::Clicked => Some(4),
            NotificationStatus::Failed => None,
        }
    }

    /// Whether a transition from `self` to `next` is a genuine forward step.
    ///
    /// Re-applying the current status or moving backwards is rejected, which is
    /// what makes status writes idempotent under at-least-once delivery.
    pub fn can_advance_to(&self, next: NotificationStatus) -> bool {
        match (self.funnel_rank(), next.funnel_rank()) {
            // Terminal: nothing leaves Failed
            (None, _) => false,
            // Failed is reachable only from Pending or Sent
            (Some(rank), None) => rank <= 1,
            (Some(current), Some(next)) => next > current,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Clicked | NotificationStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Opened => "opened",
            NotificationStatus::Clicked => "clicked",
            NotificationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to deliver one message to one recipient over one channel.
///
/// This is the wire shape published on the `notification.send` queue. The
/// recipient is an opaque encrypted string; only the dispatch worker decrypts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub id: Uuid,
    pub user_id: String,
    /// Business notification type (e.g. "payment_reminder")
    pub kind: String,
    pub channel: Channel,
    /// Encrypted recipient address (phone number or email)
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_variables: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
}

impl NotificationJob {
    pub fn new(user_id: impl Into<String>, kind: impl Into<String>, channel: Channel) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind: kind.into(),
            channel,
            recipient: String::new(),
            template_id: None,
            template_variables: None,
            subject: None,
            message: None,
            scheduled_for: None,
            priority: Priority::Normal,
        }
    }

    /// Whether the job is scheduled for a future point in time.
    pub fn is_scheduled_after(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for.map(|at| at > now).unwrap_or(false)
    }
}

/// Persisted notification row: the job superset plus delivery outcome fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub kind: String,
    pub channel: Channel,
    pub recipient: String,
    pub template_id: Option<String>,
    pub template_variables: Option<HashMap<String, String>>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub status: NotificationStatus,
    pub external_id: Option<String>,
    pub cost: Option<f64>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// Materialize a pending row from a queue job.
    pub fn from_job(job: &NotificationJob) -> Self {
        let now = Utc::now();
        Self {
            id: job.id,
            user_id: job.user_id.clone(),
            kind: job.kind.clone(),
            channel: job.channel,
            recipient: job.recipient.clone(),
            template_id: job.template_id.clone(),
            template_variables: job.template_variables.clone(),
            subject: job.subject.clone(),
            message: job.message.clone(),
            scheduled_for: job.scheduled_for,
            priority: job.priority,
            status: NotificationStatus::Pending,
            external_id: None,
            cost: None,
            error_message: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild the queue job for re-publication by the scheduled sweep.
    pub fn to_job(&self) -> NotificationJob {
        NotificationJob {
            id: self.id,
            user_id: self.user_id.clone(),
            kind: self.kind.clone(),
            channel: self.channel,
            recipient: self.recipient.clone(),
            template_id: self.template_id.clone(),
            template_variables: self.template_variables.clone(),
            subject: self.subject.clone(),
            message: self.message.clone(),
            scheduled_for: self.scheduled_for,
            priority: self.priority,
        }
    }
}

/// One immutable observation of a notification's lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub notification_id: Uuid,
    pub channel: Channel,
    pub status: NotificationStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DeliveryRecord {
    pub fn new(notification_id: Uuid, channel: Channel, status: NotificationStatus) -> Self {
        Self {
            notification_id,
            channel,
            status,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
