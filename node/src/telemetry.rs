// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const EVENTS_APPENDED: &str = "trunk_events_appended_total";
pub const EVENTS_PUSHED: &str = "trunk_events_pushed_total";
pub const EVENTS_PULLED: &str = "trunk_events_pulled_total";
pub const PUSH_FAILURES: &str = "trunk_push_failures_total";
pub const PERSISTENCE_FAILURES: &str = "trunk_persistence_failures_total";
pub const SYNC_DURATION: &str = "trunk_sync_duration_seconds";
pub const PENDING_EVENTS: &str = "trunk_pending_events";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Initialize Tracing (Logs)
    let fmt = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "trunk_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if fmt.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    // 2. Initialize Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("metrics recorder not installed: {}", e),
    }

    metrics::describe_counter!(EVENTS_APPENDED, "Events appended to the local log by user action or import");
    metrics::describe_counter!(EVENTS_PUSHED, "Events accepted by the remote store");
    metrics::describe_counter!(EVENTS_PULLED, "Remote events merged into the local log");
    metrics::describe_counter!(PUSH_FAILURES, "Individual event pushes that failed and stay pending");
    metrics::describe_counter!(PERSISTENCE_FAILURES, "Failed flushes of the local log to disk");
    metrics::describe_histogram!(SYNC_DURATION, "Duration of a full push + pull cycle");
    metrics::describe_gauge!(PENDING_EVENTS, "Events not yet confirmed by the remote store");

    metrics::gauge!("trunk_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
