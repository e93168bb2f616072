//! Webhook handler for inbound blockchain activity
//!
//! The HMAC middleware has already verified the signature; this handler
//! parses the provider envelope, classifies the event, and routes any
//! extracted swaps through the wallet membership index.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::error::AppError;
use crate::handlers::ApiState;
use crate::webhook::{classify, parse_event, Classification};

/// Webhook response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Status of the request
    pub status: WebhookStatus,
    /// Swaps extracted from the payload
    pub swaps: usize,
    /// Rooms the swaps resolved to
    pub matched_rooms: usize,
    /// Rooms that stored a new record
    pub ingested: usize,
    /// Rooms that had already seen the swap
    pub duplicates: usize,
}

/// Webhook status
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    /// Payload contained swaps, routing was attempted
    Accepted,
    /// Valid payload that does not describe a swap
    Ignored,
}

/// Webhook handler
///
/// POST /webhook
///
/// Accepts the provider's transfer, contract-event, and wallet-activity
/// payloads. Events that are not DEX swaps are acknowledged and dropped;
/// swaps fan out to every room tracking the initiating wallet.
pub async fn webhook_handler(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    state.metrics.webhook_events.inc();

    let parsed = parse_event(&payload)?;

    let raws = match classify(&parsed) {
        Classification::Swaps(raws) => raws,
        Classification::NotASwap => {
            tracing::debug!(
                webhook_id = %parsed.envelope.webhook_id,
                event_type = %parsed.envelope.event_type,
                "Webhook event is not a swap"
            );
            return Ok((
                StatusCode::OK,
                Json(WebhookResponse {
                    status: WebhookStatus::Ignored,
                    swaps: 0,
                    matched_rooms: 0,
                    ingested: 0,
                    duplicates: 0,
                }),
            ));
        }
    };

    let mut response = WebhookResponse {
        status: WebhookStatus::Accepted,
        swaps: raws.len(),
        matched_rooms: 0,
        ingested: 0,
        duplicates: 0,
    };

    for raw in raws {
        let tx_hash = raw.tx_hash.clone();
        match state.registry.route_swap(raw).await {
            Ok(summary) => {
                response.matched_rooms += summary.matched_rooms;
                response.ingested += summary.ingested;
                response.duplicates += summary.duplicates;
            }
            // One bad swap must not sink the rest of the batch
            Err(e) => {
                tracing::warn!(tx_hash = %tx_hash, error = %e, "Failed to route swap");
            }
        }
    }

    tracing::info!(
        webhook_id = %parsed.envelope.webhook_id,
        swaps = response.swaps,
        matched_rooms = response.matched_rooms,
        ingested = response.ingested,
        duplicates = response.duplicates,
        "Webhook processed"
    );

    Ok((StatusCode::ACCEPTED, Json(response)))
}
