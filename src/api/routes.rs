use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::server::AppState;

use super::health::health;
use super::metrics::prometheus_metrics;
use super::notifications::{
    get_analytics, get_channel_performance, get_notification, get_timeline, send_notification,
    track_notification,
};
use super::templates::{create_template, get_template, list_templates};
use super::tickets::{
    append_message, assign_ticket, create_ticket, get_ticket, list_user_tickets, team_statistics,
    update_ticket_status,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Notifications
                .route("/notifications", post(send_notification))
                .route("/notifications/analytics", get(get_analytics))
                .route(
                    "/notifications/channel-performance",
                    get(get_channel_performance),
                )
                .route("/notifications/{id}", get(get_notification))
                .route("/notifications/{id}/track", post(track_notification))
                .route("/notifications/{id}/timeline", get(get_timeline))
                // Templates
                .route("/templates", get(list_templates).post(create_template))
                .route("/templates/{id}", get(get_template))
                // Tickets
                .route("/tickets", post(create_ticket))
                .route("/tickets/{id}", get(get_ticket))
                .route("/tickets/{id}/messages", post(append_message))
                .route("/tickets/{id}/status", patch(update_ticket_status))
                .route("/tickets/{id}/assign", post(assign_ticket))
                .route("/users/{user_id}/tickets", get(list_user_tickets))
                // Teams
                .route("/teams/statistics", get(team_statistics)),
        )
}
