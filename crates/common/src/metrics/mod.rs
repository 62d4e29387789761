//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use crate::errors::ErrorCode;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all PeerDesk metrics
pub const METRICS_PREFIX: &str = "peerdesk";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 150ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.150,  // 150ms - P99 target
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Lifecycle metrics
    describe_counter!(
        format!("{}_submissions_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total submissions created"
    );

    describe_counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Submission status transitions, by from/to status"
    );

    describe_counter!(
        format!("{}_reviews_assigned_total", METRICS_PREFIX),
        Unit::Count,
        "Total reviewers assigned"
    );

    describe_counter!(
        format!("{}_reviews_completed_total", METRICS_PREFIX),
        Unit::Count,
        "Total reviews completed, by path"
    );

    describe_counter!(
        format!("{}_operations_rejected_total", METRICS_PREFIX),
        Unit::Count,
        "Lifecycle operations refused, by error code"
    );

    // Notification metrics
    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Notifications by event and outcome"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_submission_created() {
    counter!(format!("{}_submissions_created_total", METRICS_PREFIX)).increment(1);
}

pub fn record_transition(from: &str, to: &str) {
    counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_review_assigned() {
    counter!(format!("{}_reviews_assigned_total", METRICS_PREFIX)).increment(1);
}

/// `path` is "assigned" or "direct"
pub fn record_review_completed(path: &str) {
    counter!(
        format!("{}_reviews_completed_total", METRICS_PREFIX),
        "path" => path.to_string()
    )
    .increment(1);
}

/// Count a refused operation, labelled with the numeric error code
pub fn record_rejection(operation: &str, code: ErrorCode) {
    counter!(
        format!("{}_operations_rejected_total", METRICS_PREFIX),
        "operation" => operation.to_string(),
        "code" => code.as_code().to_string()
    )
    .increment(1);
}

pub fn record_notification(event: &str, outcome: &str) {
    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "event" => event.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
