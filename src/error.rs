//! Error types for the swaproom relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Validation error (bad address, bad label, bad threshold, bad hours)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A bounded resource is at capacity (wallet cap, lifetime cap)
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// Authentication error (webhook signature rejected)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Room, wallet, or swap lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested identifier is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The room's mailbox is gone (expired between lookup and command)
    #[error("Room closed: {0}")]
    RoomClosed(String),

    /// Market-data lookup failed; recovered locally, surfaced only in logs
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Outbound notification delivery failed; logged, never propagated
    #[error("Notification error: {0}")]
    Notification(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable reason, shared by HTTP error bodies and
    /// WebSocket error frames
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration_error",
            AppError::Validation(_) => "validation_failed",
            AppError::LimitExceeded(_) => "limit_exceeded",
            AppError::Auth(_) => "authentication_failed",
            // Externally a closed room is indistinguishable from one that
            // never existed.
            AppError::NotFound(_) | AppError::RoomClosed(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Enrichment(_) => "enrichment_failed",
            AppError::Notification(_) => "notification_failed",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// Error response structure for API
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, status, details) = match &self {
            AppError::Config(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                Some(e.to_string()),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "rejected", Some(msg.clone())),
            AppError::LimitExceeded(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "rejected", Some(msg.clone()))
            }
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "rejected", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "rejected", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "rejected", Some(msg.clone())),
            AppError::RoomClosed(code) => (
                StatusCode::NOT_FOUND,
                "rejected",
                Some(format!("Room no longer live: {}", code)),
            ),
            AppError::Enrichment(msg) => (StatusCode::BAD_GATEWAY, "error", Some(msg.clone())),
            AppError::Notification(msg) => (StatusCode::BAD_GATEWAY, "error", Some(msg.clone())),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "error", Some(msg.clone()))
            }
        };

        let error_response = ErrorResponse {
            status,
            reason: self.reason().to_string(),
            details,
        };

        // Log the error
        tracing::error!(
            error_type = %self,
            status_code = %status_code,
            "Request error"
        );

        (status_code, Json(json!(error_response))).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
