//! Notification endpoints: enqueue, inspect, track, analytics.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Channel, DeliveryRecord, Notification, NotificationJob, NotificationStatus, Priority};
use crate::error::{AppError, Result};
use crate::queue::JobQueueBackend;
use crate::server::AppState;
use crate::store::{AnalyticsFilter, NotificationStore};
use crate::tracking::DeliveryAnalytics;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    pub user_id: String,
    pub channel: Channel,
    /// Plaintext recipient; encrypted before it leaves this handler
    pub recipient: String,
    pub template_id: Option<String>,
    pub template_variables: Option<HashMap<String, String>>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationResponse {
    pub id: Uuid,
    pub status: NotificationStatus,
}

/// Queue one notification job.
pub async fn send_notification(
    State(state): State<AppState>,
    Json(request): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<SendNotificationResponse>)> {
    if request.template_id.is_none() && request.message.is_none() {
        return Err(AppError::Validation(
            "either templateId or message is required".to_string(),
        ));
    }

    // Fail closed before queuing; missing variables are permanent failures
    if let Some(ref template_id) = request.template_id {
        let empty = HashMap::new();
        let variables = request.template_variables.as_ref().unwrap_or(&empty);
        let check = state.templates.validate_variables(template_id, variables)?;
        if !check.valid {
            return Err(AppError::Validation(format!(
                "missing required variables: {}",
                check.missing.join(", ")
            )));
        }
    }

    let encrypted = state
        .cipher
        .encrypt(&request.recipient)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let kind = request
        .template_id
        .clone()
        .unwrap_or_else(|| "custom".to_string());
    let mut job = NotificationJob::new(request.user_id, kind, request.channel);
    job.recipient = encrypted;
    job.template_id = request.template_id;
    job.template_variables = request.template_variables;
    job.subject = request.subject;
    job.message = request.message;
    job.scheduled_for = request.scheduled_for;
    job.priority = request.priority;

    let id = job.id;
    state
        .queue
        .publish(&job)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SendNotificationResponse {
            id,
            status: NotificationStatus::Pending,
        }),
    ))
}

pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state
        .stores
        .notifications
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {id}")))?;
    Ok(Json(notification))
}

#[derive(Debug, Deserialize)]
pub struct TrackRequest {
    pub status: NotificationStatus,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    /// False when the observation was stale and nothing changed
    pub advanced: bool,
}

/// Record a delivery status observation (webhook-style).
pub async fn track_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TrackRequest>,
) -> Result<Json<TrackResponse>> {
    let advanced = state
        .tracking
        .track_delivery(id, request.status, request.metadata)
        .await?;
    Ok(Json(TrackResponse { advanced }))
}

pub async fn get_timeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryRecord>>> {
    // 404 for a notification that never existed, empty list for one with no records
    if state.stores.notifications.get(id).await?.is_none() {
        return Err(AppError::NotFound(format!("notification {id}")));
    }
    let timeline = state.tracking.get_delivery_timeline(id).await?;
    Ok(Json(timeline))
}

pub async fn get_analytics(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
) -> Result<Json<DeliveryAnalytics>> {
    let analytics = state.tracking.get_analytics(&filter).await?;
    Ok(Json(analytics))
}

pub async fn get_channel_performance(
    State(state): State<AppState>,
    Query(range): Query<AnalyticsFilter>,
) -> Result<Json<HashMap<String, DeliveryAnalytics>>> {
    let performance = state.tracking.get_channel_performance(&range).await?;
    Ok(Json(performance))
}
