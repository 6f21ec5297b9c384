//! Simulated SMS vendor.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::Channel;

use super::{
    ChannelProvider, ProviderError, ProviderMode, SendOutcome, SendRequest, SimulationProfile,
};

/// E.164-style phone number: optional `+`, 7-15 digits, no leading zero.
pub(crate) static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{6,14}$").unwrap());

const FAILURE_REASONS: &[&str] = &[
    "Network error",
    "Insufficient balance",
    "Carrier rejected message",
    "Number unreachable",
];

pub struct SmsProvider {
    profile: SimulationProfile,
}

impl SmsProvider {
    pub fn new(mode: ProviderMode) -> Self {
        let success_rate = match mode {
            ProviderMode::Sandbox => 0.90,
            ProviderMode::Production => 0.95,
        };
        Self {
            profile: SimulationProfile {
                latency_ms: 300..=1000,
                success_rate,
                failure_reasons: FAILURE_REASONS,
                unit_cost: 0.05,
                external_id_prefix: "sms",
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
impl ChannelProvider for SmsProvider {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, request: &SendRequest) -> Result<SendOutcome, ProviderError> {
        if !PHONE_REGEX.is_match(&request.recipient) {
            return Err(ProviderError::InvalidRecipient {
                channel: Channel::Sms,
                reason: "not a valid phone number".to_string(),
            });
        }

        let outcome = self.profile.simulate_send().await;
        tracing::debug!(
            notification_id = %request.notification_id,
            success = outcome.success,
            "SMS send attempt completed"
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
            subject: None,
            body: "hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_invalid_phone_fails_fast() {
        let provider = SmsProvider::new(ProviderMode::Sandbox).with_tuning(1.0, 0..=0);
        let err = provider.send(&request("not-a-phone")).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRecipient { .. }));
    }

    #[tokio::test]
    async fn test_valid_phone_sends() {
        let provider = SmsProvider::new(ProviderMode::Sandbox).with_tuning(1.0, 0..=0);
        let outcome = provider.send(&request("+256700123456")).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.external_id.is_some());
    }

    #[test]
    fn test_phone_regex() {
        assert!(PHONE_REGEX.is_match("+256700123456"));
        assert!(PHONE_REGEX.is_match("256700123456"));
        assert!(!PHONE_REGEX.is_match("0700123456")); // leading zero
        assert!(!PHONE_REGEX.is_match("+256 700 123"));
        assert!(!PHONE_REGEX.is_match("12345"));
    }
}
