//! Prometheus metrics for the swap relay
//!
//! Exposes metrics endpoint for monitoring:
//! - Room lifecycle counters and live-room gauge
//! - Swap ingestion and dedup counters
//! - Viewer connection gauge and dropped-delivery counter
//! - Enrichment latency and failure tracking

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Metrics state
pub struct MetricsState {
    /// Prometheus registry
    registry: Registry,
    /// Currently live rooms
    pub rooms_active: IntGauge,
    /// Rooms created since start
    pub rooms_created: IntCounter,
    /// Rooms that hit their expiry
    pub rooms_expired: IntCounter,
    /// Inbound webhook events accepted for classification
    pub webhook_events: IntCounter,
    /// Swaps ingested into rooms
    pub swaps_ingested: IntCounter,
    /// Swaps rejected as duplicates
    pub swaps_duplicate: IntCounter,
    /// Live viewer connections across all rooms
    pub ws_connections: IntGauge,
    /// Viewer connections dropped for failed delivery
    pub broadcast_dropped: IntCounter,
    /// Swap alerts handed to the notification service
    pub notifications_dispatched: IntCounter,
    /// Enrichment lookups that failed or timed out
    pub enrichment_failures: IntCounter,
    /// Enrichment lookup latency (in milliseconds)
    pub enrichment_latency: Histogram,
}

impl MetricsState {
    /// Create a new metrics state with all metrics registered
    pub fn new() -> Self {
        let registry = Registry::new();

        // Live rooms gauge
        let rooms_active = IntGauge::with_opts(Opts::new(
            "swaproom_rooms_active",
            "Number of currently live rooms",
        ))
        .expect("Failed to create rooms_active gauge");
        registry
            .register(Box::new(rooms_active.clone()))
            .expect("Failed to register rooms_active");

        // Rooms created counter
        let rooms_created = IntCounter::with_opts(Opts::new(
            "swaproom_rooms_created_total",
            "Total number of rooms created",
        ))
        .expect("Failed to create rooms_created counter");
        registry
            .register(Box::new(rooms_created.clone()))
            .expect("Failed to register rooms_created");

        // Rooms expired counter
        let rooms_expired = IntCounter::with_opts(Opts::new(
            "swaproom_rooms_expired_total",
            "Total number of rooms that reached expiry",
        ))
        .expect("Failed to create rooms_expired counter");
        registry
            .register(Box::new(rooms_expired.clone()))
            .expect("Failed to register rooms_expired");

        // Webhook events counter
        let webhook_events = IntCounter::with_opts(Opts::new(
            "swaproom_webhook_events_total",
            "Total number of inbound webhook events accepted",
        ))
        .expect("Failed to create webhook_events counter");
        registry
            .register(Box::new(webhook_events.clone()))
            .expect("Failed to register webhook_events");

        // Swaps ingested counter
        let swaps_ingested = IntCounter::with_opts(Opts::new(
            "swaproom_swaps_ingested_total",
            "Total number of swaps ingested into rooms",
        ))
        .expect("Failed to create swaps_ingested counter");
        registry
            .register(Box::new(swaps_ingested.clone()))
            .expect("Failed to register swaps_ingested");

        // Duplicate swaps counter
        let swaps_duplicate = IntCounter::with_opts(Opts::new(
            "swaproom_swaps_duplicate_total",
            "Total number of swaps rejected as duplicates",
        ))
        .expect("Failed to create swaps_duplicate counter");
        registry
            .register(Box::new(swaps_duplicate.clone()))
            .expect("Failed to register swaps_duplicate");

        // Viewer connections gauge
        let ws_connections = IntGauge::with_opts(Opts::new(
            "swaproom_ws_connections",
            "Number of live viewer WebSocket connections",
        ))
        .expect("Failed to create ws_connections gauge");
        registry
            .register(Box::new(ws_connections.clone()))
            .expect("Failed to register ws_connections");

        // Dropped deliveries counter
        let broadcast_dropped = IntCounter::with_opts(Opts::new(
            "swaproom_broadcast_dropped_total",
            "Viewer connections dropped because delivery failed",
        ))
        .expect("Failed to create broadcast_dropped counter");
        registry
            .register(Box::new(broadcast_dropped.clone()))
            .expect("Failed to register broadcast_dropped");

        // Notifications dispatched counter
        let notifications_dispatched = IntCounter::with_opts(Opts::new(
            "swaproom_notifications_dispatched_total",
            "Swap alerts handed to the notification service",
        ))
        .expect("Failed to create notifications_dispatched counter");
        registry
            .register(Box::new(notifications_dispatched.clone()))
            .expect("Failed to register notifications_dispatched");

        // Enrichment failures counter
        let enrichment_failures = IntCounter::with_opts(Opts::new(
            "swaproom_enrichment_failures_total",
            "Enrichment lookups that failed or timed out",
        ))
        .expect("Failed to create enrichment_failures counter");
        registry
            .register(Box::new(enrichment_failures.clone()))
            .expect("Failed to register enrichment_failures");

        // Enrichment latency histogram
        let enrichment_latency = Histogram::with_opts(HistogramOpts::new(
            "swaproom_enrichment_latency_ms",
            "Enrichment lookup latency in milliseconds",
        ))
        .expect("Failed to create enrichment_latency histogram");
        registry
            .register(Box::new(enrichment_latency.clone()))
            .expect("Failed to register enrichment_latency");

        Self {
            registry,
            rooms_active,
            rooms_created,
            rooms_expired,
            webhook_events,
            swaps_ingested,
            swaps_duplicate,
            ws_connections,
            broadcast_dropped,
            notifications_dispatched,
            enrichment_failures,
            enrichment_latency,
        }
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics handler - returns Prometheus metrics in text format
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.registry().gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        buffer,
    )
}

/// Create metrics router
pub fn metrics_router() -> Router<Arc<MetricsState>> {
    Router::new().route("/metrics", get(metrics_handler))
}
