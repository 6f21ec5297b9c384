//! Persistence layer.
//!
//! The relational store is the single source of truth for notifications,
//! delivery records, and tickets. Storage is abstracted behind per-concern
//! traits so the in-memory backend (tests, local development) and the
//! PostgreSQL backend are interchangeable.

mod factory;
mod memory;
mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Channel, DeliveryRecord, Notification, NotificationJob, NotificationStatus, SupportTicket,
    TicketMessage, TicketStatus,
};

pub use factory::{create_stores, Stores};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error("Store configuration error: {0}")]
    Configuration(String),
}

/// Filter for analytics queries. All fields are optional and combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsFilter {
    pub kind: Option<String>,
    pub channel: Option<Channel>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AnalyticsFilter {
    pub fn for_channel(channel: Channel) -> Self {
        Self {
            channel: Some(channel),
            ..Default::default()
        }
    }
}

/// Raw funnel tallies; the tracking service turns these into rates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelCounts {
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub failed: u64,
    /// Sum of per-notification costs matching the filter
    pub total_cost: f64,
    /// Number of notifications contributing a cost
    pub cost_count: u64,
}

/// Read-only contact lookup for building notification jobs from upstream
/// events that carry only a user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContact {
    pub user_id: String,
    pub name: String,
    /// Encrypted phone number (SMS / WhatsApp recipient)
    pub encrypted_phone: Option<String>,
    /// Encrypted email address
    pub encrypted_email: Option<String>,
}

/// Notification rows: idempotent upserts keyed by job id and monotonic status
/// transitions.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a pending row for a job, or return the existing row unchanged.
    ///
    /// At-least-once queue delivery means the same job id can arrive twice;
    /// the second upsert must not reset an already-advanced row.
    async fn upsert_job(&self, job: &NotificationJob) -> Result<Notification, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError>;

    /// Advance the status if the transition is a genuine forward step.
    ///
    /// Returns `Ok(true)` only when the row actually changed. Sets `sent_at`
    /// when advancing to `Sent`.
    async fn transition(&self, id: Uuid, status: NotificationStatus) -> Result<bool, StoreError>;

    /// Advance to `Sent` and record the provider outcome fields.
    async fn mark_sent(
        &self,
        id: Uuid,
        external_id: Option<String>,
        cost: Option<f64>,
    ) -> Result<bool, StoreError>;

    /// Advance to `Failed` and record the error message.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool, StoreError>;

    /// Pending rows whose `scheduled_for` has elapsed, ordered by priority
    /// descending then schedule time ascending, capped at `limit`.
    async fn due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;
}

/// Append-only delivery timeline plus funnel aggregation.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn append(&self, record: DeliveryRecord) -> Result<(), StoreError>;

    /// Full ordered history for one notification.
    async fn timeline(&self, notification_id: Uuid) -> Result<Vec<DeliveryRecord>, StoreError>;

    async fn funnel_counts(&self, filter: &AnalyticsFilter) -> Result<FunnelCounts, StoreError>;

    /// Delete records older than the cutoff; parent notifications are kept.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Support tickets and their message threads.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create_ticket(&self, ticket: SupportTicket) -> Result<SupportTicket, StoreError>;

    async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>, StoreError>;

    async fn tickets_for_user(&self, user_id: &str) -> Result<Vec<SupportTicket>, StoreError>;

    /// Update status; sets `resolved_at` when moving to `Resolved`.
    async fn set_status(
        &self,
        id: Uuid,
        status: TicketStatus,
    ) -> Result<SupportTicket, StoreError>;

    /// Record an assignment: sets `assigned_to` and moves the ticket to
    /// `InProgress`.
    async fn assign(&self, id: Uuid, team_id: &str) -> Result<SupportTicket, StoreError>;

    /// Count of open/in-progress tickets grouped by assignee. Recomputed
    /// before every routing decision; never cached across decisions.
    async fn active_counts_by_assignee(&self) -> Result<HashMap<String, usize>, StoreError>;

    /// Unassigned open tickets ordered by priority descending then creation
    /// time ascending, capped at `limit`.
    async fn unassigned_open(&self, limit: usize) -> Result<Vec<SupportTicket>, StoreError>;

    async fn append_message(&self, message: TicketMessage) -> Result<TicketMessage, StoreError>;

    async fn messages_for(&self, ticket_id: Uuid) -> Result<Vec<TicketMessage>, StoreError>;
}

/// Contact lookup for upstream events. The user records themselves are owned
/// by the account service; this subsystem only reads them.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn contact(&self, user_id: &str) -> Result<Option<UserContact>, StoreError>;

    /// Register a contact observed from a `user.created` event.
    async fn upsert_contact(&self, contact: UserContact) -> Result<(), StoreError>;
}
