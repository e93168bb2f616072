//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::handlers::ApiState;

/// Detailed health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_seconds: i64,
    /// Rooms currently live
    pub active_rooms: usize,
    /// Viewers currently attached across all rooms
    pub ws_connections: i64,
}

/// Detailed health check
///
/// GET /api/v1/health
///
/// The relay holds all state in memory, so liveness is the only real
/// question; the counters are for dashboards and quick inspection.
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
        active_rooms: state.registry.active_rooms(),
        ws_connections: state.metrics.ws_connections.get(),
    })
}

/// Simple health check (for load balancers)
///
/// GET /health
pub async fn health_simple() -> StatusCode {
    StatusCode::OK
}
