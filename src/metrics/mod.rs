//! Prometheus metrics.
//!
//! Covers the dispatch pipeline (jobs processed, provider latency), the
//! delivery funnel, ticket routing, and the background sweeps.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "jua";

lazy_static! {
    /// Notification jobs processed, by channel and outcome ("sent", "failed",
    /// "scheduled", "duplicate")
    pub static ref NOTIFICATIONS_PROCESSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_processed_total", METRIC_PREFIX),
        "Notification jobs processed by the dispatch worker",
        &["channel", "outcome"]
    ).unwrap();

    /// Provider send latency by channel
    pub static ref PROVIDER_SEND_SECONDS: HistogramVec = register_histogram_vec!(
        format!("{}_provider_send_seconds", METRIC_PREFIX),
        "Provider send latency",
        &["channel"],
        vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 15.0]
    ).unwrap();

    /// Delivery funnel transitions recorded, by status
    pub static ref DELIVERY_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_transitions_total", METRIC_PREFIX),
        "Delivery status transitions recorded",
        &["status"]
    ).unwrap();

    /// Current depth of the send queue (sampled by the dispatch worker)
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Depth of the notification send queue"
    ).unwrap();

    /// Tickets routed, by team
    pub static ref TICKETS_ROUTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tickets_routed_total", METRIC_PREFIX),
        "Support tickets routed to a team",
        &["team"]
    ).unwrap();

    /// Scheduled dispatch sweeps skipped because the previous run was active
    pub static ref DISPATCH_SWEEPS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dispatch_sweeps_skipped_total", METRIC_PREFIX),
        "Scheduled dispatch sweeps skipped due to an in-flight sweep"
    ).unwrap();

    /// Scheduled notifications re-published to the queue
    pub static ref SCHEDULED_REPUBLISHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_scheduled_republished_total", METRIC_PREFIX),
        "Due scheduled notifications re-published by the sweep"
    ).unwrap();

    /// Delivery records deleted by the retention task
    pub static ref RECORDS_PURGED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_records_purged_total", METRIC_PREFIX),
        "Delivery records purged by the retention task"
    ).unwrap();
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
