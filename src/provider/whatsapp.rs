//! Simulated WhatsApp vendor. Shares the phone validation with SMS.

use async_trait::async_trait;

use crate::domain::Channel;

use super::sms::PHONE_REGEX;
use super::{
    ChannelProvider, ProviderError, ProviderMode, SendOutcome, SendRequest, SimulationProfile,
};

const FAILURE_REASONS: &[&str] = &[
    "Number not registered on WhatsApp",
    "Rate limit exceeded",
    "Template not approved",
    "Network timeout",
];

pub struct WhatsappProvider {
    profile: SimulationProfile,
}

impl WhatsappProvider {
    pub fn new(mode: ProviderMode) -> Self {
        let success_rate = match mode {
            ProviderMode::Sandbox => 0.88,
            ProviderMode::Production => 0.92,
        };
        Self {
            profile: SimulationProfile {
                latency_ms: 400..=1000,
                success_rate,
                failure_reasons: FAILURE_REASONS,
                unit_cost: 0.03,
                external_id_prefix: "wa",
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
impl ChannelProvider for WhatsappProvider {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    async fn send(&self, request: &SendRequest) -> Result<SendOutcome, ProviderError> {
        if !PHONE_REGEX.is_match(&request.recipient) {
            return Err(ProviderError::InvalidRecipient {
                channel: Channel::Whatsapp,
                reason: "not a valid phone number".to_string(),
            });
        }

        let outcome = self.profile.simulate_send().await;
        tracing::debug!(
            notification_id = %request.notification_id,
            success = outcome.success,
            "WhatsApp send attempt completed"
        );
        Ok(outcome)
    }
}
