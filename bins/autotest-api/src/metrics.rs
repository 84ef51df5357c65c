// Prometheus counters for store traffic

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    pub static ref STORE_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "autotest_store_requests_total",
        "Store requests handled by the API, by operation and outcome",
        &["operation", "outcome"]
    )
    .expect("metric can be registered");
}

pub fn record(operation: &str, outcome: &str) {
    STORE_REQUESTS.with_label_values(&[operation, outcome]).inc();
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
