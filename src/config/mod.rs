mod settings;

pub use settings::{
    CryptoConfig, DatabaseConfig, DispatchConfig, ProviderConfig, QueueBackendKind, QueueConfig,
    RedisConfig, RoutingConfig, ServerConfig, Settings, StoreBackendKind, TrackingConfig,
};
