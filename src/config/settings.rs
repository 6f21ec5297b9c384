use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::provider::ProviderMode;
use crate::routing::{default_teams, TeamConfig};

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    #[default]
    Memory,
    Postgres,
}

/// Queue/bus backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackendKind,
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackendKind,
    /// Queue the dispatch worker consumes
    #[serde(default = "default_queue_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub mode: ProviderMode,
    /// Must stay shorter than the broker's message-visibility timeout
    #[serde(default = "default_send_timeout")]
    pub send_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_dispatch_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_dispatch_batch")]
    pub sweep_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_routing_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_routing_batch")]
    pub sweep_batch_size: usize,
    #[serde(default = "default_teams")]
    pub teams: Vec<TeamConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_purge_interval")]
    pub purge_interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    /// Base64-encoded 32-byte AES key for recipient addresses
    #[serde(default = "default_recipient_key")]
    pub recipient_key: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_queue_name() -> String {
    "notification.send".to_string()
}

fn default_send_timeout() -> u64 {
    15
}

fn default_dispatch_interval() -> u64 {
    60
}

fn default_dispatch_batch() -> usize {
    50
}

fn default_routing_interval() -> u64 {
    300 // 5 minutes
}

fn default_routing_batch() -> usize {
    20
}

fn default_retention_days() -> i64 {
    90
}

fn default_purge_interval() -> u64 {
    86_400 // daily
}

fn default_recipient_key() -> String {
    // Development-only key; production deployments set CRYPTO_RECIPIENTKEY
    "anVhLWRldi1yZWNpcGllbnQta2V5LTMyLWJ5dGVzISE=".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("redis.url", "redis://localhost:6379")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, DATABASE_URL, REDIS_URL, QUEUE_BACKEND, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Whether this deployment should hide internal error details.
    pub fn is_production(&self) -> bool {
        self.provider.mode == ProviderMode::Production
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Memory,
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackendKind::Memory,
            name: default_queue_name(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            mode: ProviderMode::Sandbox,
            send_timeout_seconds: default_send_timeout(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_dispatch_interval(),
            sweep_batch_size: default_dispatch_batch(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: default_routing_interval(),
            sweep_batch_size: default_routing_batch(),
            teams: default_teams(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            purge_interval_seconds: default_purge_interval(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            recipient_key: default_recipient_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let settings = Settings {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            queue: QueueConfig::default(),
            provider: ProviderConfig::default(),
            dispatch: DispatchConfig::default(),
            routing: RoutingConfig::default(),
            tracking: TrackingConfig::default(),
            crypto: CryptoConfig::default(),
        };

        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
        assert_eq!(settings.queue.name, "notification.send");
        assert_eq!(settings.dispatch.sweep_interval_seconds, 60);
        assert_eq!(settings.dispatch.sweep_batch_size, 50);
        assert_eq!(settings.routing.sweep_interval_seconds, 300);
        assert_eq!(settings.routing.sweep_batch_size, 20);
        assert_eq!(settings.tracking.retention_days, 90);
        assert!(!settings.is_production());
        // The built-in team set ships with the fallback team
        assert!(settings.routing.teams.iter().any(|t| t.id == "general"));
    }
}
