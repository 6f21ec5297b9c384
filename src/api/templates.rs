//! Template management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::Result;
use crate::server::AppState;
use crate::template::MessageTemplate;

pub async fn list_templates(State(state): State<AppState>) -> Json<Vec<MessageTemplate>> {
    Json(state.templates.list())
}

pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageTemplate>> {
    let template = state.templates.get(&id)?;
    Ok(Json(template))
}

/// Register an operator-supplied custom template.
pub async fn create_template(
    State(state): State<AppState>,
    Json(template): Json<MessageTemplate>,
) -> Result<(StatusCode, Json<MessageTemplate>)> {
    let template = state.templates.register(template)?;
    Ok((StatusCode::CREATED, Json(template)))
}
