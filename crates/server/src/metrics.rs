//! Observability metrics
//!
//! Prometheus exposition at `/metrics`. Recording helpers are no-ops until
//! a recorder is installed, so tests can call them freely.

use std::sync::OnceLock;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use voice_order_pipeline::{FinalizationResult, WorkerStats};

use crate::state::AppState;
use crate::ServerError;

/// Global Prometheus handle
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder
///
/// Must be called once at startup before recording any metrics.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

    register_default_metrics();

    METRICS_HANDLE.get_or_init(|| handle.clone());
    Ok(handle)
}

/// Get the global metrics handle
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

fn register_default_metrics() {
    gauge!("voice_order_connections_active").set(0.0);
    counter!("voice_order_connections_total").absolute(0);
    counter!("voice_order_partials_total").absolute(0);
    counter!("voice_order_utterances_abandoned_total").absolute(0);

    for provenance in ["remote", "partial", "local_full"] {
        counter!("voice_order_finals_total", "source" => provenance).absolute(0);
    }
}

/// Record a connection accepted
pub fn record_connection_opened() {
    counter!("voice_order_connections_total").increment(1);
}

/// Record a connection finished
pub fn record_connection_closed(reason: &'static str) {
    counter!("voice_order_connections_closed_total", "reason" => reason).increment(1);
}

/// Record active connections gauge
pub fn record_active_connections(count: usize) {
    gauge!("voice_order_connections_active").set(count as f64);
}

/// Record a window handed to the worker
pub fn record_window_enqueued(superseded: bool) {
    counter!("voice_order_windows_enqueued_total").increment(1);
    if superseded {
        counter!("voice_order_windows_superseded_total").increment(1);
    }
}

/// Record a partial produced by `backend`
pub fn record_partial(backend: &str, latency: Duration) {
    counter!("voice_order_partials_total").increment(1);
    histogram!("voice_order_backend_latency_seconds", "backend" => backend.to_string())
        .record(latency.as_secs_f64());
}

/// Record a worker's counters when it stops
pub fn record_worker_stats(stats: &WorkerStats) {
    counter!("voice_order_windows_processed_total").increment(stats.windows);
    counter!("voice_order_windows_skipped_total").increment(stats.skipped);
    counter!("voice_order_partial_failures_total").increment(stats.failed);
}

/// Record the tiers tried and the finalization outcome
pub fn record_finalization(result: &FinalizationResult) {
    for attempt in &result.attempts {
        let outcome = match &attempt.outcome {
            Ok(()) => "accepted",
            Err(rejection) => rejection.as_str(),
        };
        counter!(
            "voice_order_tier_attempts_total",
            "tier" => attempt.tier.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("voice_order_tier_duration_seconds", "tier" => attempt.tier.as_str())
            .record(attempt.elapsed.as_secs_f64());
    }

    histogram!("voice_order_finalization_seconds").record(result.elapsed.as_secs_f64());
    match result.provenance() {
        Some(provenance) => {
            counter!("voice_order_finals_total", "source" => provenance.as_str()).increment(1)
        }
        None => counter!("voice_order_utterances_abandoned_total").increment(1),
    }
}

/// Metrics endpoint handler
///
/// Returns Prometheus-formatted metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    record_active_connections(state.connections.count());

    match get_metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}
