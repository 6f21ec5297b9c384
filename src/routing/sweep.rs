//! Periodic sweep for unassigned tickets.
//!
//! Catches tickets that missed synchronous routing, for example when creation
//! raced a deploy. The sweep needs no overlap guard: its query filters on
//! unassigned tickets and the router ignores anything already assigned.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use super::TicketRouter;

pub struct TicketSweepTask {
    router: Arc<TicketRouter>,
    interval: Duration,
    batch_size: usize,
    shutdown: broadcast::Sender<()>,
}

impl TicketSweepTask {
    pub fn new(
        router: Arc<TicketRouter>,
        interval: Duration,
        batch_size: usize,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            router,
            interval,
            batch_size,
            shutdown,
        }
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.router.auto_route_pending_tickets(self.batch_size).await {
                        Ok(0) => {}
                        Ok(routed) => tracing::info!(routed, "Ticket sweep routed backlog"),
                        Err(e) => tracing::error!(error = %e, "Ticket sweep failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Ticket sweep task shutting down");
                    return;
                }
            }
        }
    }
}
