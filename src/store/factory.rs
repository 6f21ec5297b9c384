//! Store factory: builds the configured backend and hands out trait handles.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::config::{DatabaseConfig, StoreBackendKind};

use super::{
    MemoryStore, NotificationStore, PostgresStore, StoreError, TicketStore, TrackingStore,
    UserDirectory,
};

/// Handles to every storage concern. With either backend all handles point at
/// the same underlying store, so cross-concern reads (analytics joins) stay
/// consistent.
#[derive(Clone)]
pub struct Stores {
    pub notifications: Arc<dyn NotificationStore>,
    pub tracking: Arc<dyn TrackingStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub directory: Arc<dyn UserDirectory>,
}

impl Stores {
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            notifications: store.clone(),
            tracking: store.clone(),
            tickets: store.clone(),
            directory: store,
        }
    }

    fn from_postgres(store: Arc<PostgresStore>) -> Self {
        Self {
            notifications: store.clone(),
            tracking: store.clone(),
            tickets: store.clone(),
            directory: store,
        }
    }
}

/// Create the stores described by the configuration.
pub async fn create_stores(config: &DatabaseConfig) -> Result<Stores, StoreError> {
    match config.backend {
        StoreBackendKind::Memory => {
            tracing::info!("Using in-memory store backend");
            Ok(Stores::from_memory(Arc::new(MemoryStore::new())))
        }
        StoreBackendKind::Postgres => {
            let url = config.url.as_deref().ok_or_else(|| {
                StoreError::Configuration(
                    "database.url is required for the postgres backend".to_string(),
                )
            })?;

            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await?;

            let store = PostgresStore::new(pool);
            store.ensure_schema().await?;
            tracing::info!(
                max_connections = config.max_connections,
                "Using PostgreSQL store backend"
            );
            Ok(Stores::from_postgres(Arc::new(store)))
        }
    }
}
