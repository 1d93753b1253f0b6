//! Prometheus metrics
//!
//! Process-wide counters and histograms, exposed at `/metrics`.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder and register metric descriptions.
///
/// Safe to call more than once; later calls return the existing handle.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .unwrap_or_else(|e| {
                    // Only fails if another recorder is already installed
                    panic!("failed to install Prometheus recorder: {}", e);
                });

            describe_counter!(
                "engine_sessions_created_total",
                "Sessions created over the process lifetime"
            );
            describe_counter!(
                "engine_sessions_closed_total",
                "Sessions closed over the process lifetime"
            );
            describe_gauge!("engine_sessions_active", "Currently active sessions");
            describe_counter!(
                "engine_units_ingested_total",
                "Input units accepted for analysis, by modality"
            );
            describe_counter!(
                "engine_decode_errors_total",
                "Inbound payloads rejected by the codec"
            );
            describe_counter!(
                "engine_ws_messages_total",
                "Inbound WebSocket messages, by kind"
            );

            handle
        })
        .clone()
}

pub fn record_session_created(active: usize) {
    counter!("engine_sessions_created_total").increment(1);
    gauge!("engine_sessions_active").set(active as f64);
}

pub fn record_session_closed(active: usize) {
    counter!("engine_sessions_closed_total").increment(1);
    gauge!("engine_sessions_active").set(active as f64);
}

pub fn record_unit_ingested(modality: &'static str) {
    counter!("engine_units_ingested_total", "modality" => modality).increment(1);
}

pub fn record_decode_error(modality: &'static str) {
    counter!("engine_decode_errors_total", "modality" => modality).increment(1);
}

pub fn record_ws_message(kind: &'static str) {
    counter!("engine_ws_messages_total", "kind" => kind).increment(1);
}

/// Render the current metrics snapshot in the Prometheus exposition format.
pub async fn metrics_handler() -> String {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}
