//! PostgreSQL store backend.
//!
//! Enums are stored as TEXT, template variables as JSONB. The schema is
//! bootstrapped with `CREATE TABLE IF NOT EXISTS` on startup.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{
    Channel, DeliveryRecord, Notification, NotificationJob, NotificationStatus, Priority,
    SupportTicket, TicketMessage, TicketPriority, TicketStatus,
};

use super::{
    AnalyticsFilter, FunnelCounts, NotificationStore, StoreError, TicketStore, TrackingStore,
    UserContact, UserDirectory,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS notifications (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    channel TEXT NOT NULL,
    recipient TEXT NOT NULL,
    template_id TEXT,
    template_variables JSONB,
    subject TEXT,
    message TEXT,
    scheduled_for TIMESTAMPTZ,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    external_id TEXT,
    cost DOUBLE PRECISION,
    error_message TEXT,
    sent_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_scheduled
    ON notifications (status, scheduled_for) WHERE scheduled_for IS NOT NULL;

CREATE TABLE IF NOT EXISTS delivery_records (
    id BIGSERIAL PRIMARY KEY,
    notification_id UUID NOT NULL,
    channel TEXT NOT NULL,
    status TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL,
    metadata JSONB NOT NULL DEFAULT 'null'::jsonb
);
CREATE INDEX IF NOT EXISTS idx_delivery_records_notification
    ON delivery_records (notification_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_delivery_records_recorded_at
    ON delivery_records (recorded_at);

CREATE TABLE IF NOT EXISTS support_tickets (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL,
    assigned_to TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    resolved_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_support_tickets_unassigned
    ON support_tickets (status, created_at) WHERE assigned_to IS NULL;

CREATE TABLE IF NOT EXISTS ticket_messages (
    id UUID PRIMARY KEY,
    ticket_id UUID NOT NULL,
    sender TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ticket_messages_ticket
    ON ticket_messages (ticket_id, created_at);

CREATE TABLE IF NOT EXISTS user_contacts (
    user_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    encrypted_phone TEXT,
    encrypted_email TEXT
);
"#;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bootstrap the schema. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn parse_channel(raw: &str) -> Result<Channel, StoreError> {
    match raw {
        "sms" => Ok(Channel::Sms),
        "email" => Ok(Channel::Email),
        "whatsapp" => Ok(Channel::Whatsapp),
        other => Err(StoreError::Decode(format!("unknown channel {other}"))),
    }
}

fn parse_status(raw: &str) -> Result<NotificationStatus, StoreError> {
    match raw {
        "pending" => Ok(NotificationStatus::Pending),
        "sent" => Ok(NotificationStatus::Sent),
        "delivered" => Ok(NotificationStatus::Delivered),
        "opened" => Ok(NotificationStatus::Opened),
        "clicked" => Ok(NotificationStatus::Clicked),
        "failed" => Ok(NotificationStatus::Failed),
        other => Err(StoreError::Decode(format!("unknown status {other}"))),
    }
}

fn parse_priority(raw: &str) -> Result<Priority, StoreError> {
    match raw {
        "low" => Ok(Priority::Low),
        "normal" => Ok(Priority::Normal),
        "high" => Ok(Priority::High),
        other => Err(StoreError::Decode(format!("unknown priority {other}"))),
    }
}

fn parse_ticket_status(raw: &str) -> Result<TicketStatus, StoreError> {
    match raw {
        "open" => Ok(TicketStatus::Open),
        "in_progress" => Ok(TicketStatus::InProgress),
        "resolved" => Ok(TicketStatus::Resolved),
        "closed" => Ok(TicketStatus::Closed),
        other => Err(StoreError::Decode(format!("unknown ticket status {other}"))),
    }
}

fn parse_ticket_priority(raw: &str) -> Result<TicketPriority, StoreError> {
    match raw {
        "low" => Ok(TicketPriority::Low),
        "medium" => Ok(TicketPriority::Medium),
        "high" => Ok(TicketPriority::High),
        "urgent" => Ok(TicketPriority::Urgent),
        other => Err(StoreError::Decode(format!(
            "unknown ticket priority {other}"
        ))),
    }
}

fn notification_from_row(row: &PgRow) -> Result<Notification, StoreError> {
    let channel: String = row.try_get("channel")?;
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    let variables: Option<serde_json::Value> = row.try_get("template_variables")?;
    let template_variables: Option<HashMap<String, String>> = match variables {
        Some(serde_json::Value::Null) | None => None,
        Some(value) => Some(serde_json::from_value(value)?),
    };

    Ok(Notification {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kind: row.try_get("kind")?,
        channel: parse_channel(&channel)?,
        recipient: row.try_get("recipient")?,
        template_id: row.try_get("template_id")?,
        template_variables,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        scheduled_for: row.try_get("scheduled_for")?,
        priority: parse_priority(&priority)?,
        status: parse_status(&status)?,
        external_id: row.try_get("external_id")?,
        cost: row.try_get("cost")?,
        error_message: row.try_get("error_message")?,
        sent_at: row.try_get("sent_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<SupportTicket, StoreError> {
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;

    Ok(SupportTicket {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        priority: parse_ticket_priority(&priority)?,
        status: parse_ticket_status(&status)?,
        assigned_to: row.try_get("assigned_to")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<DeliveryRecord, StoreError> {
    let channel: String = row.try_get("channel")?;
    let status: String = row.try_get("status")?;

    Ok(DeliveryRecord {
        notification_id: row.try_get("notification_id")?,
        channel: parse_channel(&channel)?,
        status: parse_status(&status)?,
        timestamp: row.try_get("recorded_at")?,
        metadata: row.try_get("metadata")?,
    })
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn upsert_job(&self, job: &NotificationJob) -> Result<Notification, StoreError> {
        let row = Notification::from_job(job);
        let variables = match &row.template_variables {
            Some(vars) => Some(serde_json::to_value(vars)?),
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, kind, channel, recipient, template_id, template_variables,
                subject, message, scheduled_for, priority, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(&row.user_id)
        .bind(&row.kind)
        .bind(row.channel.as_str())
        .bind(&row.recipient)
        .bind(&row.template_id)
        .bind(variables)
        .bind(&row.subject)
        .bind(&row.message)
        .bind(row.scheduled_for)
        .bind(match row.priority {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        })
        .bind(row.status.as_str())
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        self.get(job.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("notification {}", job.id)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row = sqlx::query("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| notification_from_row(&r)).transpose()
    }

    async fn transition(&self, id: Uuid, status: NotificationStatus) -> Result<bool, StoreError> {
        // Read-check-write under a row lock so the monotonic guard holds
        // across concurrent consumers.
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query("SELECT status FROM notifications WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = current else {
            return Err(StoreError::NotFound(format!("notification {id}")));
        };
        let current_status = parse_status(&row.try_get::<String, _>("status")?)?;

        if !current_status.can_advance_to(status) {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2,
                updated_at = NOW(),
                sent_at = CASE WHEN $2 = 'sent' AND sent_at IS NULL THEN NOW() ELSE sent_at END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
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
            sqlx::query("UPDATE notifications SET external_id = $2, cost = $3 WHERE id = $1")
                .bind(id)
                .bind(external_id)
                .bind(cost)
                .execute(&self.pool)
                .await?;
        }
        Ok(advanced)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<bool, StoreError> {
        let advanced = self.transition(id, NotificationStatus::Failed).await?;
        if advanced {
            sqlx::query("UPDATE notifications SET error_message = $2 WHERE id = $1")
                .bind(id)
                .bind(error)
                .execute(&self.pool)
                .await?;
        }
        Ok(advanced)
    }

    async fn due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM notifications
            WHERE status = 'pending' AND scheduled_for IS NOT NULL AND scheduled_for <= $1
            ORDER BY
                CASE priority WHEN 'high' THEN 2 WHEN 'normal' THEN 1 ELSE 0 END DESC,
                scheduled_for ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }
}

#[async_trait]
impl TrackingStore for PostgresStore {
    async fn append(&self, record: DeliveryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO delivery_records (notification_id, channel, status, recorded_at, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.notification_id)
        .bind(record.channel.as_str())
        .bind(record.status.as_str())
        .bind(record.timestamp)
        .bind(record.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn timeline(&self, notification_id: Uuid) -> Result<Vec<DeliveryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT notification_id, channel, status, recorded_at, metadata
            FROM delivery_records
            WHERE notification_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(notification_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn funnel_counts(&self, filter: &AnalyticsFilter) -> Result<FunnelCounts, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE r.status = 'sent') AS sent,
                COUNT(*) FILTER (WHERE r.status = 'delivered') AS delivered,
                COUNT(*) FILTER (WHERE r.status = 'opened') AS opened,
                COUNT(*) FILTER (WHERE r.status = 'clicked') AS clicked,
                COUNT(*) FILTER (WHERE r.status = 'failed') AS failed
            FROM delivery_records r
            JOIN notifications n ON n.id = r.notification_id
            WHERE ($1::text IS NULL OR n.kind = $1)
              AND ($2::text IS NULL OR r.channel = $2)
              AND ($3::timestamptz IS NULL OR r.recorded_at >= $3)
              AND ($4::timestamptz IS NULL OR r.recorded_at <= $4)
            "#,
        )
        .bind(filter.kind.as_deref())
        .bind(filter.channel.map(|c| c.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await?;

        let cost_row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(cost), 0)::double precision AS total_cost,
                   COUNT(cost) AS cost_count
            FROM notifications
            WHERE cost IS NOT NULL
              AND ($1::text IS NULL OR kind = $1)
              AND ($2::text IS NULL OR channel = $2)
              AND ($3::timestamptz IS NULL OR sent_at >= $3)
              AND ($4::timestamptz IS NULL OR sent_at <= $4)
            "#,
        )
        .bind(filter.kind.as_deref())
        .bind(filter.channel.map(|c| c.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await?;

        Ok(FunnelCounts {
            sent: row.try_get::<i64, _>("sent")? as u64,
            delivered: row.try_get::<i64, _>("delivered")? as u64,
            opened: row.try_get::<i64, _>("opened")? as u64,
            clicked: row.try_get::<i64, _>("clicked")? as u64,
            failed: row.try_get::<i64, _>("failed")? as u64,
            total_cost: cost_row.try_get("total_cost")?,
            cost_count: cost_row.try_get::<i64, _>("cost_count")? as u64,
        })
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM delivery_records WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TicketStore for PostgresStore {
    async fn create_ticket(&self, ticket: SupportTicket) -> Result<SupportTicket, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO support_tickets (
                id, user_id, subject, description, category, priority, status,
                assigned_to, created_at, updated_at, resolved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(ticket.id)
        .bind(&ticket.user_id)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(&ticket.category)
        .bind(ticket.priority.as_str())
        .bind(ticket.status.as_str())
        .bind(&ticket.assigned_to)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .bind(ticket.resolved_at)
        .execute(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<SupportTicket>, StoreError> {
        let row = sqlx::query("SELECT * FROM support_tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| ticket_from_row(&r)).transpose()
    }

    async fn tickets_for_user(&self, user_id: &str) -> Result<Vec<SupportTicket>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM support_tickets WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(ticket_from_row).collect()
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: TicketStatus,
    ) -> Result<SupportTicket, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE support_tickets
            SET status = $2,
                updated_at = NOW(),
                resolved_at = CASE
                    WHEN $2 = 'resolved' AND resolved_at IS NULL THEN NOW()
                    ELSE resolved_at
                END
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => ticket_from_row(&r),
            None => Err(StoreError::NotFound(format!("ticket {id}"))),
        }
    }

    async fn assign(&self, id: Uuid, team_id: &str) -> Result<SupportTicket, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE support_tickets
            SET assigned_to = $2, status = 'in_progress', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => ticket_from_row(&r),
            None => Err(StoreError::NotFound(format!("ticket {id}"))),
        }
    }

    async fn active_counts_by_assignee(&self) -> Result<HashMap<String, usize>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT assigned_to, COUNT(*) AS active
            FROM support_tickets
            WHERE assigned_to IS NOT NULL AND status IN ('open', 'in_progress')
            GROUP BY assigned_to
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let assignee: String = row.try_get("assigned_to")?;
            let active: i64 = row.try_get("active")?;
            counts.insert(assignee, active as usize);
        }
        Ok(counts)
    }

    async fn unassigned_open(&self, limit: usize) -> Result<Vec<SupportTicket>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM support_tickets
            WHERE assigned_to IS NULL AND status = 'open'
            ORDER BY
                CASE priority
                    WHEN 'urgent' THEN 3 WHEN 'high' THEN 2 WHEN 'medium' THEN 1 ELSE 0
                END DESC,
                created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(ticket_from_row).collect()
    }

    async fn append_message(&self, message: TicketMessage) -> Result<TicketMessage, StoreError> {
        let exists = sqlx::query("SELECT 1 FROM support_tickets WHERE id = $1")
            .bind(message.ticket_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!(
                "ticket {}",
                message.ticket_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO ticket_messages (id, ticket_id, sender, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(message.id)
        .bind(message.ticket_id)
        .bind(&message.sender)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(message)
    }

    async fn messages_for(&self, ticket_id: Uuid) -> Result<Vec<TicketMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM ticket_messages WHERE ticket_id = $1 ORDER BY created_at ASC",
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TicketMessage {
                    id: row.try_get("id")?,
                    ticket_id: row.try_get("ticket_id")?,
                    sender: row.try_get("sender")?,
                    body: row.try_get("body")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn contact(&self, user_id: &str) -> Result<Option<UserContact>, StoreError> {
        let row = sqlx::query("SELECT * FROM user_contacts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            Ok(UserContact {
                user_id: r.try_get("user_id")?,
                name: r.try_get("name")?,
                encrypted_phone: r.try_get("encrypted_phone")?,
                encrypted_email: r.try_get("encrypted_email")?,
            })
        })
        .transpose()
    }

    async fn upsert_contact(&self, contact: UserContact) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_contacts (user_id, name, encrypted_phone, encrypted_email)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET name = EXCLUDED.name,
                encrypted_phone = EXCLUDED.encrypted_phone,
                encrypted_email = EXCLUDED.encrypted_email
            "#,
        )
        .bind(&contact.user_id)
        .bind(&contact.name)
        .bind(&contact.encrypted_phone)
        .bind(&contact.encrypted_email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
