//! Routing decisions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bus::{events, topics, EventBus, EventEnvelope};
use crate::domain::{SupportTicket, TicketPriority};
use crate::metrics;
use crate::store::TicketStore;

use super::teams::{TeamConfig, TeamRegistry, TeamStatistics};
use super::{RoutingError, RoutingResult};

pub struct TicketRouter {
    registry: Arc<TeamRegistry>,
    tickets: Arc<dyn TicketStore>,
    bus: Arc<dyn EventBus>,
    /// Serializes read-then-assign so two concurrent decisions cannot both
    /// count the same free slot.
    decision_lock: Mutex<()>,
}

impl TicketRouter {
    pub fn new(
        registry: Arc<TeamRegistry>,
        tickets: Arc<dyn TicketStore>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            registry,
            tickets,
            bus,
            decision_lock: Mutex::new(()),
        }
    }

    /// Route one ticket to a team.
    ///
    /// Urgent tickets go to escalation unconditionally; otherwise the first
    /// team in registration order that is available, matches category and
    /// priority, and has a free slot wins. No match falls back to general.
    /// An already-assigned ticket is returned unchanged, which makes the
    /// periodic sweep safe to overlap with synchronous routing.
    pub async fn route_ticket(&self, ticket_id: Uuid) -> RoutingResult<SupportTicket> {
        let ticket = self
            .tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or(RoutingError::UnknownTicket(ticket_id))?;

        if ticket.assigned_to.is_some() {
            return Ok(ticket);
        }

        let _guard = self.decision_lock.lock().await;

        // Re-read under the lock; a concurrent decision may have assigned it
        let ticket = self
            .tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or(RoutingError::UnknownTicket(ticket_id))?;
        if ticket.assigned_to.is_some() {
            return Ok(ticket);
        }

        let counts = self.tickets.active_counts_by_assignee().await?;
        let team = self.select_team(&ticket, &counts);

        let assigned = self.tickets.assign(ticket_id, &team.id).await?;
        metrics::TICKETS_ROUTED_TOTAL
            .with_label_values(&[team.id.as_str()])
            .inc();

        let envelope = EventEnvelope::new(
            events::TICKET_ROUTED,
            serde_json::json!({
                "ticketId": ticket_id,
                "teamId": team.id,
                "teamName": team.name,
                "category": ticket.category,
                "priority": ticket.priority,
            }),
        );
        if let Err(e) = self.bus.publish(topics::SUPPORT_EVENTS, envelope).await {
            tracing::warn!(error = %e, "Failed to publish ticket-routed event");
        }

        tracing::info!(
            ticket_id = %ticket_id,
            team_id = %team.id,
            category = %ticket.category,
            priority = %ticket.priority,
            "Routed ticket"
        );
        Ok(assigned)
    }

    fn select_team<'a>(
        &'a self,
        ticket: &SupportTicket,
        counts: &HashMap<String, usize>,
    ) -> &'a TeamConfig {
        let load = |team: &TeamConfig| counts.get(&team.id).copied().unwrap_or(0);

        if ticket.priority == TicketPriority::Urgent {
            if let Some(escalation) = self.registry.escalation() {
                // Capacity is advisory for urgent tickets
                if load(escalation) >= escalation.max_concurrent_tickets {
                    tracing::warn!(
                        ticket_id = %ticket.id,
                        current = load(escalation),
                        max = escalation.max_concurrent_tickets,
                        "Escalation team over capacity, routing urgent ticket anyway"
                    );
                }
                return escalation;
            }
        }

        self.registry
            .iter()
            .find(|team| {
                team.available
                    && team.accepts_category(&ticket.category)
                    && team.accepts_priority(ticket.priority)
                    && load(team) < team.max_concurrent_tickets
            })
            .unwrap_or_else(|| self.registry.general())
    }

    /// Route up to `limit` unassigned open tickets, most pressing first.
    /// Returns how many were routed.
    pub async fn auto_route_pending_tickets(&self, limit: usize) -> RoutingResult<usize> {
        let pending = self.tickets.unassigned_open(limit).await?;
        let mut routed = 0;

        for ticket in pending {
            match self.route_ticket(ticket.id).await {
                Ok(_) => routed += 1,
                Err(e) => {
                    tracing::error!(ticket_id = %ticket.id, error = %e, "Auto-routing failed");
                }
            }
        }
        Ok(routed)
    }

    /// Manual assignment: bypasses the matching algorithm but still refuses
    /// unavailable teams. Capacity is deliberately not enforced here.
    pub async fn assign_to_team(
        &self,
        ticket_id: Uuid,
        team_id: &str,
    ) -> RoutingResult<SupportTicket> {
        let team = self
            .registry
            .get(team_id)
            .ok_or_else(|| RoutingError::UnknownTeam(team_id.to_string()))?;
        if !team.available {
            return Err(RoutingError::TeamUnavailable(team_id.to_string()));
        }

        if self.tickets.get_ticket(ticket_id).await?.is_none() {
            return Err(RoutingError::UnknownTicket(ticket_id));
        }

        let assigned = self.tickets.assign(ticket_id, team_id).await?;
        metrics::TICKETS_ROUTED_TOTAL
            .with_label_values(&[team_id])
            .inc();
        tracing::info!(ticket_id = %ticket_id, team_id, "Manually assigned ticket");
        Ok(assigned)
    }

    /// Fresh per-team load snapshot.
    pub async fn get_team_statistics(&self) -> RoutingResult<Vec<TeamStatistics>> {
        let counts = self.tickets.active_counts_by_assignee().await?;

        Ok(self
            .registry
            .iter()
            .map(|team| {
                let current = counts.get(&team.id).copied().unwrap_or(0);
                let utilization = if team.max_concurrent_tickets == 0 {
                    0.0
                } else {
                    current as f64 / team.max_concurrent_tickets as f64 * 100.0
                };
                TeamStatistics {
                    id: team.id.clone(),
                    name: team.name.clone(),
                    current_tickets: current,
                    max_tickets: team.max_concurrent_tickets,
                    utilization,
                    available: team.available,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::domain::TicketStatus;
    use crate::routing::default_teams;
    use crate::store::MemoryStore;

    fn router(store: Arc<MemoryStore>) -> (TicketRouter, Arc<MemoryBus>) {
        let bus = Arc::new(MemoryBus::new());
        let registry = Arc::new(TeamRegistry::new(default_teams()).unwrap());
        (TicketRouter::new(registry, store, bus.clone()), bus)
    }

    async fn ticket(
        store: &MemoryStore,
        category: &str,
        priority: TicketPriority,
    ) -> SupportTicket {
        store
            .create_ticket(SupportTicket::new(
                "u-1",
                "subject",
                "description",
                category,
                priority,
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_match_in_registration_order() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        let t = ticket(&store, "payment", TicketPriority::High).await;
        let routed = router.route_ticket(t.id).await.unwrap();

        assert_eq!(routed.assigned_to.as_deref(), Some("payments"));
        assert_eq!(routed.status, TicketStatus::InProgress);
    }

    #[tokio::test]
    async fn test_urgent_routes_to_escalation_even_with_spare_team() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        // Vehicle team is empty and would match, but urgent wins
        let t = ticket(&store, "vehicle", TicketPriority::Urgent).await;
        let routed = router.route_ticket(t.id).await.unwrap();
        assert_eq!(routed.assigned_to.as_deref(), Some("escalation"));
    }

    #[tokio::test]
    async fn test_urgent_ignores_escalation_capacity() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        // Fill escalation past its ceiling of 5
        for _ in 0..5 {
            let t = ticket(&store, "payment", TicketPriority::Urgent).await;
            router.route_ticket(t.id).await.unwrap();
        }

        let t = ticket(&store, "payment", TicketPriority::Urgent).await;
        let routed = router.route_ticket(t.id).await.unwrap();
        assert_eq!(routed.assigned_to.as_deref(), Some("escalation"));
    }

    #[tokio::test]
    async fn test_full_team_falls_through_to_general() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        // Saturate the payments team (capacity 10)
        for _ in 0..10 {
            let t = ticket(&store, "payment", TicketPriority::Medium).await;
            let routed = router.route_ticket(t.id).await.unwrap();
            assert_eq!(routed.assigned_to.as_deref(), Some("payments"));
        }

        let t = ticket(&store, "payment", TicketPriority::High).await;
        let routed = router.route_ticket(t.id).await.unwrap();
        assert_eq!(routed.assigned_to.as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn test_unknown_category_falls_back_to_general() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        let t = ticket(&store, "something-new", TicketPriority::Low).await;
        let routed = router.route_ticket(t.id).await.unwrap();
        assert_eq!(routed.assigned_to.as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn test_already_assigned_ticket_is_untouched() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        let t = ticket(&store, "payment", TicketPriority::Medium).await;
        let first = router.route_ticket(t.id).await.unwrap();
        let second = router.route_ticket(t.id).await.unwrap();
        assert_eq!(first.assigned_to, second.assigned_to);
    }

    #[tokio::test]
    async fn test_routing_emits_event() {
        let store = Arc::new(MemoryStore::new());
        let (router, bus) = router(store.clone());
        let mut rx = bus.subscribe();

        let t = ticket(&store, "payment", TicketPriority::Medium).await;
        router.route_ticket(t.id).await.unwrap();

        let (topic, envelope) = rx.recv().await.unwrap();
        assert_eq!(topic, topics::SUPPORT_EVENTS);
        assert_eq!(envelope.event, events::TICKET_ROUTED);
        assert_eq!(envelope.data["teamId"], "payments");
        assert_eq!(envelope.data["priority"], "medium");
    }

    #[tokio::test]
    async fn test_auto_route_clears_backlog_by_priority() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        ticket(&store, "payment", TicketPriority::Low).await;
        let urgent = ticket(&store, "payment", TicketPriority::Urgent).await;

        let routed = router.auto_route_pending_tickets(20).await.unwrap();
        assert_eq!(routed, 2);

        let urgent = store.get_ticket(urgent.id).await.unwrap().unwrap();
        assert_eq!(urgent.assigned_to.as_deref(), Some("escalation"));
    }

    #[tokio::test]
    async fn test_manual_assignment_skips_capacity() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        // Escalation nominally holds 5; manual assignment does not care
        for _ in 0..6 {
            let t = ticket(&store, "payment", TicketPriority::Low).await;
            let assigned = router.assign_to_team(t.id, "escalation").await.unwrap();
            assert_eq!(assigned.assigned_to.as_deref(), Some("escalation"));
        }
    }

    #[tokio::test]
    async fn test_manual_assignment_rejects_unknown_team() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());
        let t = ticket(&store, "payment", TicketPriority::Low).await;

        assert!(matches!(
            router.assign_to_team(t.id, "nope").await,
            Err(RoutingError::UnknownTeam(_))
        ));
    }

    #[tokio::test]
    async fn test_statistics_recompute_load() {
        let store = Arc::new(MemoryStore::new());
        let (router, _bus) = router(store.clone());

        let t = ticket(&store, "payment", TicketPriority::Medium).await;
        router.route_ticket(t.id).await.unwrap();

        let stats = router.get_team_statistics().await.unwrap();
        let payments = stats.iter().find(|s| s.id == "payments").unwrap();
        assert_eq!(payments.current_tickets, 1);
        assert_eq!(payments.max_tickets, 10);
        assert!((payments.utilization - 10.0).abs() < 1e-9);
    }
}
