//! Prometheus metrics endpoint.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::metrics::encode_metrics;

pub async fn prometheus_metrics() -> Response {
    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
