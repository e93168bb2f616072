//! REST handlers for room lifecycle and wallet management
//!
//! Provides endpoints for:
//! - Rooms: create, fetch, extend
//! - Wallets: add and remove tracked wallets
//! - Notifications: configure or clear the per-room alert webhook
//! - History: paginated swap log

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::MetricsState;
use crate::models::{NotificationConfig, RoomSnapshot, SwapHistoryPage};
use crate::registry::RoomRegistry;

// =============================================================================
// API STATE
// =============================================================================

/// Shared state for HTTP and WebSocket handlers
pub struct ApiState {
    pub registry: RoomRegistry,
    pub config: Arc<AppConfig>,
    pub metrics: Arc<MetricsState>,
    /// Application start time, for uptime reporting
    pub started_at: DateTime<Utc>,
}

// =============================================================================
// ROOM LIFECYCLE
// =============================================================================

/// Request body for room creation
#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    /// Custom room code; a random one is generated when absent
    pub code: Option<String>,
}

/// Response for room creation
#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Create a room
///
/// POST /api/v1/rooms
pub async fn create_room(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), AppError> {
    let handle = state.registry.create_room(body.code)?;
    let snapshot = handle.snapshot().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            code: snapshot.code,
            created_at: snapshot.created_at,
            expires_at: snapshot.expires_at,
        }),
    ))
}

/// Fetch a room snapshot
///
/// GET /api/v1/rooms/:code
pub async fn get_room(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = state.registry.room(&code)?.snapshot().await?;
    Ok(Json(snapshot))
}

/// Request body for lifetime extension
#[derive(Debug, Deserialize)]
pub struct ExtendRoomRequest {
    /// Hours to add to the current expiry
    pub hours: i64,
}

/// Response for lifetime extension
#[derive(Debug, Serialize)]
pub struct ExtendRoomResponse {
    pub expires_at: DateTime<Utc>,
}

/// Extend a room's lifetime
///
/// POST /api/v1/rooms/:code/extend
pub async fn extend_room(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
    Json(body): Json<ExtendRoomRequest>,
) -> Result<Json<ExtendRoomResponse>, AppError> {
    let expires_at = state.registry.room(&code)?.extend(body.hours).await?;
    Ok(Json(ExtendRoomResponse { expires_at }))
}

// =============================================================================
// WALLETS
// =============================================================================

/// Request body for tracking a wallet
#[derive(Debug, Deserialize)]
pub struct AddWalletRequest {
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Track a wallet in a room
///
/// POST /api/v1/rooms/:code/wallets
pub async fn add_wallet(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
    Json(body): Json<AddWalletRequest>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = state
        .registry
        .room(&code)?
        .add_wallet(body.address, body.label)
        .await?;
    Ok(Json(snapshot))
}

/// Stop tracking a wallet
///
/// DELETE /api/v1/rooms/:code/wallets/:address
pub async fn remove_wallet(
    State(state): State<Arc<ApiState>>,
    Path((code, address)): Path<(String, String)>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = state.registry.room(&code)?.remove_wallet(address).await?;
    Ok(Json(snapshot))
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Configure the room's threshold alert webhook
///
/// PUT /api/v1/rooms/:code/notifications
pub async fn configure_notification(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
    Json(body): Json<NotificationConfig>,
) -> Result<StatusCode, AppError> {
    state
        .registry
        .room(&code)?
        .configure_notification(Some(body))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Clear the room's alert webhook
///
/// DELETE /api/v1/rooms/:code/notifications
pub async fn remove_notification(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .registry
        .room(&code)?
        .configure_notification(None)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// SWAP HISTORY
// =============================================================================

/// Query parameters for the swap history page
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// Fetch a page of the room's swap log, newest first
///
/// GET /api/v1/rooms/:code/swaps
pub async fn swap_history(
    State(state): State<Arc<ApiState>>,
    Path(code): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<SwapHistoryPage>, AppError> {
    let page = params.page.unwrap_or(1);
    let per_page = params.per_page.unwrap_or(50);
    let history = state.registry.room(&code)?.history(page, per_page).await?;
    Ok(Json(history))
}
