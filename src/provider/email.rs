//! Simulated email vendor.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::Channel;

use super::{
    ChannelProvider, ProviderError, ProviderMode, SendOutcome, SendRequest, SimulationProfile,
};

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

const FAILURE_REASONS: &[&str] = &[
    "Mailbox full",
    "Spam filter rejection",
    "Domain not found",
    "Recipient server timeout",
];

pub struct EmailProvider {
    profile: SimulationProfile,
}

impl EmailProvider {
    pub fn new(mode: ProviderMode) -> Self {
        let success_rate = match mode {
            ProviderMode::Sandbox => 0.95,
            ProviderMode::Production => 0.98,
        };
        Self {
            profile: SimulationProfile {
                latency_ms: 200..=500,
                success_rate,
                failure_reasons: FAILURE_REASONS,
                unit_cost: 0.001,
                external_id_prefix: "email",
            },
        }
    }

    /// Deterministic tuning for tests.
    pub fn with_tuning(mut self, success_rate: f64, latency_ms: std::ops::RangeInclusive<u64>) -> Self {
        self.profile.success_rate = success_rate;
        self.profile.latency_ms = latency_ms;
        self
    }
}

#[async_trait]
impl ChannelProvider for EmailProvider {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, request: &SendRequest) -> Result<SendOutcome, ProviderError> {
        if !EMAIL_REGEX.is_match(&request.recipient) {
            return Err(ProviderError::InvalidRecipient {
                channel: Channel::Email,
                reason: "not a valid email address".to_string(),
            });
        }

        let outcome = self.profile.simulate_send().await;
        tracing::debug!(
            notification_id = %request.notification_id,
            success = outcome.success,
            has_subject = request.subject.is_some(),
            "Email send attempt completed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(recipient: &str) -> SendRequest {
        SendRequest {
            notification_id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            subject: Some("Subject".to_string()),
            body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_email_fails_fast() {
        let provider = EmailProvider::new(ProviderMode::Sandbox).with_tuning(1.0, 0..=0);
        let err = provider.send(&request("nope@")).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRecipient { .. }));
    }

    #[tokio::test]
    async fn test_valid_email_sends() {
        let provider = EmailProvider::new(ProviderMode::Sandbox).with_tuning(1.0, 0..=0);
        let outcome = provider.send(&request("amina@example.com")).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.cost, Some(0.001));
    }

    #[test]
    fn test_email_regex() {
        assert!(EMAIL_REGEX.is_match("amina@example.com"));
        assert!(EMAIL_REGEX.is_match("a.b+tag@sub.example.co.ug"));
        assert!(!EMAIL_REGEX.is_match("plain-string"));
        assert!(!EMAIL_REGEX.is_match("@example.com"));
    }
}
