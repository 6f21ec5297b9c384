use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jua_notification_service::bus::{EventConsumer, RedisEventSubscriber};
use jua_notification_service::config::{QueueBackendKind, Settings};
use jua_notification_service::dispatch::{NotificationWorker, ScheduledDispatchTask};
use jua_notification_service::routing::TicketSweepTask;
use jua_notification_service::server::{create_app, AppState};
use jua_notification_service::tracking::RetentionTask;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone()).await?;
    tracing::info!("Application state initialized");

    let (shutdown, _) = broadcast::channel(1);
    let mut handles = Vec::new();

    // Dispatch worker: consumes the send queue
    let worker = NotificationWorker::new(
        state.queue.clone(),
        state.stores.notifications.clone(),
        state.stores.tracking.clone(),
        state.templates.clone(),
        state.providers.clone(),
        state.cipher.clone(),
        state.bus.clone(),
        Duration::from_secs(settings.provider.send_timeout_seconds),
        shutdown.clone(),
    );
    handles.push(tokio::spawn(async move { worker.run().await }));

    // Scheduled notification sweep
    let dispatch_sweep = ScheduledDispatchTask::new(
        state.stores.notifications.clone(),
        state.queue.clone(),
        Duration::from_secs(settings.dispatch.sweep_interval_seconds),
        settings.dispatch.sweep_batch_size,
        shutdown.clone(),
    );
    handles.push(tokio::spawn(async move { dispatch_sweep.run().await }));

    // Unassigned ticket sweep
    let ticket_sweep = TicketSweepTask::new(
        state.router.clone(),
        Duration::from_secs(settings.routing.sweep_interval_seconds),
        settings.routing.sweep_batch_size,
        shutdown.clone(),
    );
    handles.push(tokio::spawn(async move { ticket_sweep.run().await }));

    // Delivery record retention
    let retention = RetentionTask::new(
        state.stores.tracking.clone(),
        settings.tracking.retention_days,
        Duration::from_secs(settings.tracking.purge_interval_seconds),
        shutdown.clone(),
    );
    handles.push(tokio::spawn(async move { retention.run().await }));

    // Upstream event subscription (Redis deployments only; the in-memory bus
    // has no external producers)
    if settings.queue.backend == QueueBackendKind::Redis {
        let consumer = Arc::new(EventConsumer::new(
            state.queue.clone(),
            state.stores.directory.clone(),
            state.cipher.clone(),
        ));
        let subscriber = RedisEventSubscriber::new(
            settings.redis.url.clone(),
            consumer,
            shutdown.clone(),
        );
        handles.push(tokio::spawn(async move { subscriber.run().await }));
    }

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown.clone()))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Signal every background task
    let _ = shutdown_tx.send(());
}
