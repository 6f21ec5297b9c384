//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::queue::JobQueueBackend;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub queue: QueueHealthResponse,
    pub templates: usize,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    pub depth: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let depth = state.queue.depth().await.unwrap_or(0);

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue: QueueHealthResponse {
            backend: format!("{:?}", state.settings.queue.backend).to_lowercase(),
            depth,
        },
        templates: state.templates.count(),
    })
}
