//! Prometheus Metrics Module
//!
//! Provides gateway metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Dispatch event counts by event name
//! - Reconnect counts by kind (resume, full)
//! - Heartbeats sent and heartbeat ACK latency
//! - Current connection phase

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Dispatch counter - tracks DISPATCH events by name
pub static GATEWAY_DISPATCH_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gateway_dispatch_events_total", "Total number of dispatch events received")
            .namespace("chat_client"),
        &["event"],
    )
    .expect("Failed to create GATEWAY_DISPATCH_EVENTS_TOTAL metric")
});

/// Reconnect counter
pub static GATEWAY_RECONNECTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gateway_reconnects_total", "Total number of gateway reconnects")
            .namespace("chat_client"),
        &["kind"], // "resume", "full"
    )
    .expect("Failed to create GATEWAY_RECONNECTS_TOTAL metric")
});

/// Heartbeats sent
pub static GATEWAY_HEARTBEATS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("gateway_heartbeats_total", "Total number of heartbeats sent")
            .namespace("chat_client"),
    )
    .expect("Failed to create GATEWAY_HEARTBEATS_TOTAL metric")
});

/// Time between a heartbeat and its ACK
pub static GATEWAY_HEARTBEAT_LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let buckets = vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];
    Histogram::with_opts(
        HistogramOpts::new(
            "gateway_heartbeat_latency_seconds",
            "Heartbeat acknowledgement latency in seconds",
        )
        .namespace("chat_client")
        .buckets(buckets),
    )
    .expect("Failed to create GATEWAY_HEARTBEAT_LATENCY_SECONDS metric")
});

/// Connection phase gauge (see `ConnectionPhase::ordinal`)
pub static GATEWAY_CONNECTION_PHASE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("gateway_connection_phase", "Current gateway connection phase")
            .namespace("chat_client"),
    )
    .expect("Failed to create GATEWAY_CONNECTION_PHASE metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(GATEWAY_DISPATCH_EVENTS_TOTAL.clone()))
        .expect("Failed to register GATEWAY_DISPATCH_EVENTS_TOTAL");
    registry
        .register(Box::new(GATEWAY_RECONNECTS_TOTAL.clone()))
        .expect("Failed to register GATEWAY_RECONNECTS_TOTAL");
    registry
        .register(Box::new(GATEWAY_HEARTBEATS_TOTAL.clone()))
        .expect("Failed to register GATEWAY_HEARTBEATS_TOTAL");
    registry
        .register(Box::new(GATEWAY_HEARTBEAT_LATENCY_SECONDS.clone()))
        .expect("Failed to register GATEWAY_HEARTBEAT_LATENCY_SECONDS");
    registry
        .register(Box::new(GATEWAY_CONNECTION_PHASE.clone()))
        .expect("Failed to register GATEWAY_CONNECTION_PHASE");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}

/// Helper to count a dispatch event
pub fn record_dispatch(event: &str) {
    GATEWAY_DISPATCH_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Helper to count a reconnect
pub fn record_reconnect(resume: bool) {
    let kind = if resume { "resume" } else { "full" };
    GATEWAY_RECONNECTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to count a sent heartbeat
pub fn record_heartbeat() {
    GATEWAY_HEARTBEATS_TOTAL.inc();
}

/// Helper to record heartbeat ACK latency
pub fn record_heartbeat_latency(latency_secs: f64) {
    GATEWAY_HEARTBEAT_LATENCY_SECONDS.observe(latency_secs);
}

/// Helper to update the connection phase gauge
pub fn set_connection_phase(ordinal: i64) {
    GATEWAY_CONNECTION_PHASE.set(ordinal);
}
