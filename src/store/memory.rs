//! In-memory store backend.
//!
//! Default backend for tests and local development. One `MemoryStore`
//! implements every storage trait so the factory can hand out cheap clones of
//! a single `Arc`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dashmap::DashMap;

use crate::domain::{
    DeliveryRecord, Notification, NotificationJob, NotificationStatus, SupportTicket,
    TicketMessage, TicketStatus,
};

use super::{
    AnalyticsFilter, FunnelCounts, NotificationStore, StoreError, TicketStore, TrackingStore,
    UserContact, UserDirectory,
};

#[derive(Default)]
pub struct MemoryStore {
    notifications: DashMap<Uuid, Notification>,
    /// Append-only; insertion order is the timeline order
    records: RwLock<Vec<DeliveryRecord>>,
    tickets: DashMap<Uuid, SupportTicket>,
    ticket_messages: RwLock<Vec<TicketMessage>>,
    contacts: DashMap<String, UserContact>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_filter(&self, record: &DeliveryRecord, filter: &AnalyticsFilter) -> bool {
        if let Some(channel) = filter.channel {
            if record.channel != channel {
                return false;
            }
        }
        if let Some(from) = filter.from {
            if record.timestamp < from {
                return false;
            }
        }
        if let Some(to) = filter.to {
            if record.timestamp > to {
                return false;
            }
        }
        if let Some(ref kind) = filter.kind {
            match self.notifications.get(&record.notification_id) {
                Some(n) if &n.kind == kind => {}
                _ => return false,
            }
        }
        true
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn upsert_job(&self, job: &NotificationJob) -> Result<Notification, StoreError> {
        let entry = self
            .notifications
            .entry(job.id)
            .or_insert_with(|| Notification::from_job(job));
        Ok(entry.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.notifications.get(&id).map(|n| n.clone()))
    }

    async fn transition(&self, id: Uuid, status: NotificationStatus) -> Result<bool, StoreError> {
        let mut entry = self
            .notifications
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {id}")))?;

        if !entry.status.can_advance_to(status) {
            return Ok(false);
        }

        entry.status = status;
        entry.updated_at = Utc::now();
        if status == NotificationStatus::Sent && entry.sent_at.is_none() {
            entry.sent_at = Some(entry.updated_at);
        }
        Ok(true)
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        external_id: Option<String>,
        cost: Option<f64>,
    ) -> Result<bool, StoreError> {
        let advanced = self.transition(id, NotificationStatus::Sent).await?;
        if advanced {
            if let Some(mut entry) = self.notifications.get_mut(&id) {
                entry.external_id = external_id;
                entry.cost = cost;
            }
        }
        Ok(advanced)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool, StoreError> {
        let advanced = self.transition(id, NotificationStatus::Failed).await?;
        if advanced {
            if let Some(mut entry) = self.notifications.get_mut(&id) {
                entry.error_message = Some(error.to_string());
            }
        }
        Ok(advanced)
    }

    async fn due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut due: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| {
                n.status == NotificationStatus::Pending
                    && n.scheduled_for.map(|at| at <= now).unwrap_or(false)
            })
            .map(|n| n.clone())
            .collect();

        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.scheduled_for.cmp(&b.scheduled_for))
        });
        due.truncate(limit);
        Ok(due)
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn append(&self, record: DeliveryRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .expect("records lock poisoned")
            .push(record);
        Ok(())
    }

    async fn timeline(&self, notification_id: Uuid) -> Result<Vec<DeliveryRecord>, StoreError> {
        let records = self.records.read().expect("records lock poisoned");
        Ok(records
            .iter()
            .filter(|r| r.notification_id == notification_id)
            .cloned()
            .collect())
    }

    async fn funnel_counts(&self, filter: &AnalyticsFilter) -> Result<FunnelCounts, StoreError> {
        let mut counts = FunnelCounts::default();

        {
            let records = self.records.read().expect("records lock poisoned");
            for record in records.iter().filter(|r| self.matches_filter(r, filter)) {
                match record.status {
                    NotificationStatus::Sent => counts.sent += 1,
                    NotificationStatus::Delivered => counts.delivered += 1,
                    NotificationStatus::Opened => counts.opened += 1,
                    NotificationStatus::Clicked => counts.clicked += 1,
                    NotificationStatus::Failed => counts.failed += 1,
                    NotificationStatus::Pending => {}
                }
            }
        }

        // Costs come from the notification rows, scoped by the same filter
        for n in self.notifications.iter() {
            if let Some(ref kind) = filter.kind {
                if &n.kind != kind {
                    continue;
                }
            }
            if let Some(channel) = filter.channel {
                if n.channel != channel {
                    continue;
                }
            }
            let Some(sent_at) = n.sent_at else { continue };
            if filter.from.map(|from| sent_at < from).unwrap_or(false) {
                continue;
            }
            if filter.to.map(|to| sent_at > to).unwrap_or(false) {
                continue;
            }
            if let Some(cost) = n.cost {
                counts.total_cost += cost;
                counts.cost_count += 1;
            }
        }

        Ok(counts)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.write().expect("records lock poisoned");
        let before = records.len();
        records.retain(|r| r.timestamp >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn create_ticket(&self, ticket: SupportTicket) -> Result<SupportTicket, StoreError> {
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>, StoreError> {
        Ok(self.tickets.get(&id).map(|t| t.clone()))
    }

    async fn tickets_for_user(&self, user_id: &str) -> Result<Vec<SupportTicket>, StoreError> {
        let mut tickets: Vec<SupportTicket> = self
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.clone())
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TicketStatus,
    ) -> Result<SupportTicket, StoreError> {
        let mut entry = self
            .tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {id}")))?;

        entry.status = status;
        entry.updated_at = Utc::now();
        if status == TicketStatus::Resolved && entry.resolved_at.is_none() {
            entry.resolved_at = Some(entry.updated_at);
        }
        Ok(entry.clone())
    }

    async fn assign(&self, id: Uuid, team_id: &str) -> Result<SupportTicket, StoreError> {
        let mut entry = self
            .tickets
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {id}")))?;

        entry.assigned_to = Some(team_id.to_string());
        entry.status = TicketStatus::InProgress;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn active_counts_by_assignee(&self) -> Result<HashMap<String, usize>, StoreError> {
        let mut counts = HashMap::new();
        for ticket in self.tickets.iter() {
            if ticket.status.is_active() {
                if let Some(ref assignee) = ticket.assigned_to {
                    *counts.entry(assignee.clone()).or_insert(0) += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn unassigned_open(&self, limit: usize) -> Result<Vec<SupportTicket>, StoreError> {
        let mut tickets: Vec<SupportTicket> = self
            .tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Open && t.assigned_to.is_none())
            .map(|t| t.clone())
            .collect();

        tickets.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        tickets.truncate(limit);
        Ok(tickets)
    }

    async fn append_message(&self, message: TicketMessage) -> Result<TicketMessage, StoreError> {
        if !self.tickets.contains_key(&message.ticket_id) {
            return Err(StoreError::NotFound(format!(
                "ticket {}",
                message.ticket_id
            )));
        }
        self.ticket_messages
            .write()
            .expect("messages lock poisoned")
            .push(message.clone());
        Ok(message)
    }

    async fn messages_for(&self, ticket_id: Uuid) -> Result<Vec<TicketMessage>, StoreError> {
        let messages = self.ticket_messages.read().expect("messages lock poisoned");
        Ok(messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn contact(&self, user_id: &str) -> Result<Option<UserContact>, StoreError> {
        Ok(self.contacts.get(user_id).map(|c| c.clone()))
    }

    async fn upsert_contact(&self, contact: UserContact) -> Result<(), StoreError> {
        self.contacts.insert(contact.user_id.clone(), contact);
        Ok(())
    }
}
