//! Upstream event consumer.
//!
//! Translates domain events from the payment, account, and telematics services
//! into `NotificationJob`s on the send queue. Every handler is best-effort: a
//! failure is logged and the event dropped, never bounced back upstream.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::{CryptoError, RecipientCipher};
use crate::domain::{Channel, NotificationJob, Priority};
use crate::queue::{JobQueueBackend, QueueBackendError};
use crate::store::{StoreError, UserContact, UserDirectory};

use super::{events, topics, EventEnvelope};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("No contact on file for user {0}")]
    UnknownUser(String),

    #[error("No reachable channel for user {0}")]
    NoChannel(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Queue(#[from] QueueBackendError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentCompleted {
    user_id: String,
    amount: f64,
    #[allow(dead_code)]
    payment_plan_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentFailed {
    user_id: String,
    amount: f64,
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentOverdue {
    user_id: String,
    amount: f64,
    days_overdue: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserCreated {
    user_id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskDetected {
    user_id: String,
    risk_type: String,
    severity: String,
}

/// Bridges the event bus to the notification queue.
pub struct EventConsumer {
    queue: Arc<dyn JobQueueBackend>,
    directory: Arc<dyn UserDirectory>,
    cipher: Arc<RecipientCipher>,
}

impl EventConsumer {
    pub fn new(
        queue: Arc<dyn JobQueueBackend>,
        directory: Arc<dyn UserDirectory>,
        cipher: Arc<RecipientCipher>,
    ) -> Self {
        Self {
            queue,
            directory,
            cipher,
        }
    }

    /// Handle one event. Failures are logged here so the subscriber loop never
    /// stalls on a bad message.
    pub async fn handle(&self, topic: &str, envelope: EventEnvelope) {
        let event = envelope.event.clone();
        if let Err(e) = self.dispatch(topic, envelope).await {
            tracing::error!(topic = %topic, event = %event, error = %e, "Event handling failed");
        }
    }

    async fn dispatch(&self, topic: &str, envelope: EventEnvelope) -> Result<(), ConsumerError> {
        match (topic, envelope.event.as_str()) {
            (topics::PAYMENT_EVENTS, "payment.completed") => {
                self.on_payment_completed(serde_json::from_value(envelope.data)?)
                    .await
            }
            (topics::PAYMENT_EVENTS, "payment.failed") => {
                self.on_payment_failed(serde_json::from_value(envelope.data)?)
                    .await
            }
            (topics::PAYMENT_EVENTS, "payment.overdue") => {
                self.on_payment_overdue(serde_json::from_value(envelope.data)?)
                    .await
            }
            (topics::USER_EVENTS, "user.created") => {
                self.on_user_created(serde_json::from_value(envelope.data)?)
                    .await
            }
            (topics::TELEMATICS_EVENTS, "telematics.risk.detected") => {
                self.on_risk_detected(serde_json::from_value(envelope.data)?)
                    .await
            }
            (topics::SUPPORT_EVENTS, events::TICKET_CREATED) => {
                tracing::info!(data = %envelope.data, "Support ticket created");
                Ok(())
            }
            (_, event) => {
                tracing::debug!(topic = %topic, event = %event, "Ignoring event");
                Ok(())
            }
        }
    }

    async fn on_payment_completed(&self, payload: PaymentCompleted) -> Result<(), ConsumerError> {
        let contact = self.contact_for(&payload.user_id).await?;
        let vars = HashMap::from([
            ("name".to_string(), contact.name.clone()),
            ("amount".to_string(), format_amount(payload.amount)),
        ]);
        self.enqueue_templated(&contact, "payment_confirmation", vars, Priority::Normal)
            .await
    }

    async fn on_payment_failed(&self, payload: PaymentFailed) -> Result<(), ConsumerError> {
        let contact = self.contact_for(&payload.user_id).await?;
        let vars = HashMap::from([
            ("name".to_string(), contact.name.clone()),
            ("amount".to_string(), format_amount(payload.amount)),
            ("reason".to_string(), payload.reason),
        ]);
        self.enqueue_templated(&contact, "payment_failed", vars, Priority::Normal)
            .await
    }

    async fn on_payment_overdue(&self, payload: PaymentOverdue) -> Result<(), ConsumerError> {
        let contact = self.contact_for(&payload.user_id).await?;
        let vars = HashMap::from([
            ("name".to_string(), contact.name.clone()),
            ("amount".to_string(), format_amount(payload.amount)),
            ("daysOverdue".to_string(), payload.days_overdue.to_string()),
        ]);
        self.enqueue_templated(&contact, "payment_overdue", vars, Priority::High)
            .await
    }

    async fn on_user_created(&self, payload: UserCreated) -> Result<(), ConsumerError> {
        let encrypted_phone = payload
            .phone
            .as_deref()
            .map(|p| self.cipher.encrypt(p))
            .transpose()?;
        let encrypted_email = payload
            .email
            .as_deref()
            .map(|e| self.cipher.encrypt(e))
            .transpose()?;

        let contact = UserContact {
            user_id: payload.user_id.clone(),
            name: payload.name.clone(),
            encrypted_phone,
            encrypted_email,
        };
        self.directory.upsert_contact(contact.clone()).await?;

        let vars = HashMap::from([("name".to_string(), payload.name)]);
        self.enqueue_templated(&contact, "welcome", vars, Priority::Normal)
            .await
    }

    async fn on_risk_detected(&self, payload: RiskDetected) -> Result<(), ConsumerError> {
        // Only critical findings reach the member; lesser severities stay in
        // the telematics service's own dashboards.
        if payload.severity != "critical" {
            tracing::debug!(
                user_id = %payload.user_id,
                severity = %payload.severity,
                "Skipping non-critical risk event"
            );
            return Ok(());
        }

        let contact = self.contact_for(&payload.user_id).await?;
        let vars = HashMap::from([
            ("name".to_string(), contact.name.clone()),
            ("riskType".to_string(), payload.risk_type),
        ]);
        self.enqueue_templated(&contact, "risk_alert", vars, Priority::High)
            .await
    }

    async fn contact_for(&self, user_id: &str) -> Result<UserContact, ConsumerError> {
        self.directory
            .contact(user_id)
            .await?
            .ok_or_else(|| ConsumerError::UnknownUser(user_id.to_string()))
    }

    async fn enqueue_templated(
        &self,
        contact: &UserContact,
        template_id: &str,
        variables: HashMap<String, String>,
        priority: Priority,
    ) -> Result<(), ConsumerError> {
        let (channel, recipient) = preferred_channel(contact)
            .ok_or_else(|| ConsumerError::NoChannel(contact.user_id.clone()))?;

        let mut job = NotificationJob::new(&contact.user_id, template_id, channel);
        job.recipient = recipient;
        job.template_id = Some(template_id.to_string());
        job.template_variables = Some(variables);
        job.priority = priority;

        self.queue.publish(&job).await?;
        tracing::info!(
            notification_id = %job.id,
            user_id = %contact.user_id,
            template_id = %template_id,
            channel = %channel,
            "Enqueued notification job"
        );
        Ok(())
    }
}

/// SMS is the primary channel in this market; email is the fallback.
fn preferred_channel(contact: &UserContact) -> Option<(Channel, String)> {
    if let Some(phone) = &contact.encrypted_phone {
        return Some((Channel::Sms, phone.clone()));
    }
    contact
        .encrypted_email
        .as_ref()
        .map(|email| (Channel::Email, email.clone()))
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("UGX {:.0}", amount)
    } else {
        format!("UGX {:.2}", amount)
    }
}
