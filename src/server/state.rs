use std::sync::Arc;

use crate::bus::{create_bus, EventBus};
use crate::config::Settings;
use crate::crypto::RecipientCipher;
use crate::provider::ProviderRegistry;
use crate::queue::{create_queue, JobQueueBackend};
use crate::routing::{TeamRegistry, TicketRouter};
use crate::store::{create_stores, Stores};
use crate::template::TemplateStore;
use crate::tracking::DeliveryTrackingService;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub stores: Stores,
    pub queue: Arc<dyn JobQueueBackend>,
    pub bus: Arc<dyn EventBus>,
    pub templates: Arc<TemplateStore>,
    pub providers: Arc<ProviderRegistry>,
    pub cipher: Arc<RecipientCipher>,
    pub tracking: Arc<DeliveryTrackingService>,
    pub router: Arc<TicketRouter>,
}

impl AppState {
    /// Build every shared component from configuration.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let stores = create_stores(&settings.database).await?;
        let queue = create_queue(&settings.queue, &settings.redis.url).await?;
        let bus = create_bus(settings.queue.backend, &settings.redis.url).await?;
        let templates = TemplateStore::with_builtins();
        let providers = Arc::new(ProviderRegistry::new(settings.provider.mode));
        let cipher = Arc::new(RecipientCipher::from_base64_key(
            &settings.crypto.recipient_key,
        )?);

        let registry = Arc::new(TeamRegistry::new(settings.routing.teams.clone())?);
        let router = Arc::new(TicketRouter::new(
            registry,
            stores.tickets.clone(),
            bus.clone(),
        ));
        let tracking = Arc::new(DeliveryTrackingService::new(
            stores.notifications.clone(),
            stores.tracking.clone(),
            bus.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            stores,
            queue,
            bus,
            templates,
            providers,
            cipher,
            tracking,
            router,
        })
    }
}
