//! Channel provider abstraction.
//!
//! SMS, Email, and WhatsApp share one send contract: validate the recipient,
//! pay the vendor latency, and return a structured outcome. The vendors are
//! simulated here; a real SDK integration replaces the body of `send` behind
//! the same trait without touching callers.

mod email;
mod sms;
mod whatsapp;

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Channel;

pub use email::EmailProvider;
pub use sms::SmsProvider;
pub use whatsapp::WhatsappProvider;

/// Deployment mode driving simulated vendor reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    #[default]
    Sandbox,
    Production,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Recipient failed format validation; no send was attempted.
    #[error("Invalid recipient for {channel}: {reason}")]
    InvalidRecipient { channel: Channel, reason: String },
}

/// One send request handed to a provider. The recipient is plaintext here;
/// decryption happens in the worker immediately before this call.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub notification_id: Uuid,
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

/// Provider-reported delivery state for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Sent,
    Failed,
    Pending,
}

/// Structured result of a provider send attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub state: DeliveryState,
    pub external_id: Option<String>,
    pub message: Option<String>,
    pub cost: Option<f64>,
}

impl SendOutcome {
    fn sent(external_id: String, cost: f64) -> Self {
        Self {
            success: true,
            state: DeliveryState::Sent,
            external_id: Some(external_id),
            message: None,
            cost: Some(cost),
        }
    }

    fn failed(reason: &str) -> Self {
        Self {
            success: false,
            state: DeliveryState::Failed,
            external_id: None,
            message: Some(reason.to_string()),
            cost: None,
        }
    }
}

/// Uniform send contract over heterogeneous vendor APIs.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    fn channel(&self) -> Channel;

    /// Validate, send, and report a structured outcome.
    ///
    /// `Err(InvalidRecipient)` means validation failed fast and nothing was
    /// attempted; an unsuccessful `SendOutcome` means the vendor rejected the
    /// message.
    async fn send(&self, request: &SendRequest) -> Result<SendOutcome, ProviderError>;
}

/// Tunable simulation parameters shared by the three providers.
#[derive(Debug, Clone)]
pub(crate) struct SimulationProfile {
    pub latency_ms: RangeInclusive<u64>,
    pub success_rate: f64,
    pub failure_reasons: &'static [&'static str],
    pub unit_cost: f64,
    pub external_id_prefix: &'static str,
}

impl SimulationProfile {
    /// Run the simulated vendor call: latency, then a probabilistic outcome.
    pub async fn simulate_send(&self) -> SendOutcome {
        // Draw everything before awaiting; the rng is not Send
        let (latency, succeeded, reason_idx) = {
            let mut rng = rand::rng();
            let latency = rng.random_range(self.latency_ms.clone());
            let succeeded = rng.random_bool(self.success_rate);
            let reason_idx = rng.random_range(0..self.failure_reasons.len());
            (latency, succeeded, reason_idx)
        };

        tokio::time::sleep(Duration::from_millis(latency)).await;

        if succeeded {
            SendOutcome::sent(
                format!("{}_{}", self.external_id_prefix, Uuid::new_v4().simple()),
                self.unit_cost,
            )
        } else {
            SendOutcome::failed(self.failure_reasons[reason_idx])
        }
    }
}

/// Channel-to-provider lookup, built once at startup.
pub struct ProviderRegistry {
    providers: HashMap<Channel, Arc<dyn ChannelProvider>>,
}

impl ProviderRegistry {
    /// Build the simulated provider set for the configured mode.
    pub fn new(mode: ProviderMode) -> Self {
        let providers: Vec<Arc<dyn ChannelProvider>> = vec![
            Arc::new(SmsProvider::new(mode)),
            Arc::new(EmailProvider::new(mode)),
            Arc::new(WhatsappProvider::new(mode)),
        ];
        Self::from_providers(providers)
    }

    /// Build a registry from explicit providers (used by tests and future real
    /// vendor integrations).
    pub fn from_providers(providers: Vec<Arc<dyn ChannelProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.channel(), p))
            .collect();
        Self { providers }
    }

    pub fn for_channel(&self, channel: Channel) -> Option<Arc<dyn ChannelProvider>> {
        self.providers.get(&channel).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_covers_all_channels() {
        let registry = ProviderRegistry::new(ProviderMode::Sandbox);
        for channel in Channel::all() {
            let provider = registry.for_channel(channel).unwrap();
            assert_eq!(provider.channel(), channel);
        }
    }

    #[tokio::test]
    async fn test_simulation_success_path() {
        let profile = SimulationProfile {
            latency_ms: 0..=0,
            success_rate: 1.0,
            failure_reasons: &["unused"],
            unit_cost: 0.05,
            external_id_prefix: "test",
        };

        let outcome = profile.simulate_send().await;
        assert!(outcome.success);
        assert_eq!(outcome.state, DeliveryState::Sent);
        assert!(outcome.external_id.unwrap().starts_with("test_"));
        assert_eq!(outcome.cost, Some(0.05));
    }

    #[tokio::test]
    async fn test_simulation_failure_uses_fixed_vocabulary() {
        let profile = SimulationProfile {
            latency_ms: 0..=0,
            success_rate: 0.0,
            failure_reasons: &["Network error", "Carrier rejected message"],
            unit_cost: 0.05,
            external_id_prefix: "test",
        };

        let outcome = profile.simulate_send().await;
        assert!(!outcome.success);
        assert_eq!(outcome.state, DeliveryState::Failed);
        let reason = outcome.message.unwrap();
        assert!(profile.failure_reasons.contains(&reason.as_str()));
        assert!(outcome.cost.is_none());
    }
}
