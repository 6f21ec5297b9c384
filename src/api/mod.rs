//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod notifications;
mod routes;
mod templates;
mod tickets;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use notifications::{
    get_analytics, get_channel_performance, get_notification, get_timeline, send_notification,
    track_notification,
};
pub use routes::api_routes;
pub use templates::{create_template, get_template, list_templates};
pub use tickets::{
    append_message, assign_ticket, create_ticket, get_ticket, list_user_tickets, team_statistics,
    update_ticket_status,
};
