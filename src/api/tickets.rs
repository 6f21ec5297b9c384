//! Support ticket endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::{events, topics, EventBus, EventEnvelope};
use crate::domain::{SupportTicket, TicketMessage, TicketPriority, TicketStatus};
use crate::error::{AppError, Result};
use crate::routing::TeamStatistics;
use crate::server::AppState;
use crate::store::TicketStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub user_id: String,
    pub subject: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

/// Create a ticket and route it synchronously.
pub async fn create_ticket(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<SupportTicket>)> {
    let ticket = SupportTicket::new(
        request.user_id,
        request.subject,
        request.description,
        request.category,
        request.priority,
    );
    let ticket = state.stores.tickets.create_ticket(ticket).await?;

    let envelope = EventEnvelope::new(
        events::TICKET_CREATED,
        serde_json::json!({
            "ticketId": ticket.id,
            "userId": ticket.user_id,
            "category": ticket.category,
            "priority": ticket.priority,
        }),
    );
    if let Err(e) = state.bus.publish(topics::SUPPORT_EVENTS, envelope).await {
        tracing::warn!(error = %e, "Failed to publish ticket-created event");
    }

    let routed = state.router.route_ticket(ticket.id).await?;
    Ok((StatusCode::CREATED, Json(routed)))
}

pub async fn list_user_tickets(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<SupportTicket>>> {
    let tickets = state.stores.tickets.tickets_for_user(&user_id).await?;
    Ok(Json(tickets))
}

#[derive(Debug, Serialize)]
pub struct TicketDetailResponse {
    #[serde(flatten)]
    pub ticket: SupportTicket,
    pub messages: Vec<TicketMessage>,
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetailResponse>> {
    let ticket = state
        .stores
        .tickets
        .get_ticket(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("ticket {id}")))?;
    let messages = state.stores.tickets.messages_for(id).await?;
    Ok(Json(TicketDetailResponse { ticket, messages }))
}

#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    pub sender: String,
    pub body: String,
}

pub async fn append_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AppendMessageRequest>,
) -> Result<(StatusCode, Json<TicketMessage>)> {
    let message = TicketMessage::new(id, request.sender, request.body);
    let message = state.stores.tickets.append_message(message).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TicketStatus,
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<SupportTicket>> {
    let ticket = state.stores.tickets.set_status(id, request.status).await?;
    Ok(Json(ticket))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTicketRequest {
    pub team_id: String,
}

/// Manual assignment escape hatch.
pub async fn assign_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignTicketRequest>,
) -> Result<Json<SupportTicket>> {
    let ticket = state.router.assign_to_team(id, &request.team_id).await?;
    Ok(Json(ticket))
}

pub async fn team_statistics(
    State(state): State<AppState>,
) -> Result<Json<Vec<TeamStatistics>>> {
    let stats = state.router.get_team_statistics().await?;
    Ok(Json(stats))
}
