//! Inbound webhook payload contract
//!
//! The provider posts JSON with a small common envelope (`webhookId`,
//! `eventType`, `network`) and a type-specific body. Parsing happens in two
//! stages so a payload missing its envelope is rejected before any
//! classification work: first the envelope, then the variant picked by
//! `eventType`. Unknown event types parse successfully and classify as
//! non-swaps downstream.

mod parser;

pub use parser::*;

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Fields every provider event carries
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "webhookId")]
    pub webhook_id: String,
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_network() -> String {
    "eth-mainnet".to_string()
}

/// A plain value transfer
#[derive(Debug, Clone, Deserialize)]
pub struct TransferEvent {
    #[serde(rename = "fromAddress")]
    pub from_address: String,
    #[serde(rename = "toAddress")]
    pub to_address: Option<String>,
    /// Asset symbol as reported by the provider ("ETH", "USDC", ...)
    pub asset: Option<String>,
    pub value: Option<f64>,
    pub hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: Option<u64>,
}

/// A decoded contract interaction
#[derive(Debug, Clone, Deserialize)]
pub struct ContractEvent {
    #[serde(rename = "contractAddress")]
    pub contract_address: String,
    #[serde(rename = "methodName")]
    pub method_name: Option<String>,
    /// Wallet that sent the transaction
    #[serde(rename = "fromAddress")]
    pub from_address: Option<String>,
    #[serde(rename = "tokenIn")]
    pub token_in: Option<String>,
    #[serde(rename = "tokenOut")]
    pub token_out: Option<String>,
    #[serde(rename = "amountIn")]
    pub amount_in: Option<f64>,
    #[serde(rename = "amountOut")]
    pub amount_out: Option<f64>,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: Option<u64>,
}

/// A batch of activity items for a watched wallet
#[derive(Debug, Clone, Deserialize)]
pub struct WalletActivityEvent {
    pub activity: Vec<ActivityItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityItem {
    #[serde(rename = "fromAddress")]
    pub from_address: String,
    #[serde(rename = "toAddress")]
    pub to_address: Option<String>,
    pub hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: Option<u64>,
    pub value: Option<f64>,
    pub asset: Option<String>,
    /// Provider category ("token", "external", "internal", ...)
    pub category: Option<String>,
    /// Decoded method name when the provider supplies one
    pub method: Option<String>,
    #[serde(rename = "rawContract")]
    pub raw_contract: Option<RawContract>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContract {
    pub address: Option<String>,
}

/// The type-specific body of one webhook event
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Transfer(TransferEvent),
    ContractEvent(ContractEvent),
    WalletActivity(WalletActivityEvent),
    /// Recognized envelope, unrecognized type; kept for logging
    Unknown(String),
}

/// Envelope plus decoded body
#[derive(Debug, Clone)]
pub struct ParsedWebhook {
    pub envelope: WebhookEnvelope,
    pub event: WebhookEvent,
}

/// Parse a raw JSON payload into its envelope and typed body.
///
/// Rejects payloads whose envelope is missing or empty before touching the
/// variant body; a well-formed envelope with a malformed body is also a
/// validation error (the provider contract promises the shape).
pub fn parse_event(value: &serde_json::Value) -> Result<ParsedWebhook, AppError> {
    let envelope: WebhookEnvelope = serde_json::from_value(value.clone())
        .map_err(|e| AppError::Validation(format!("Malformed webhook envelope: {}", e)))?;

    if envelope.webhook_id.trim().is_empty() {
        return Err(AppError::Validation("Empty webhookId".to_string()));
    }
    if envelope.event_type.trim().is_empty() {
        return Err(AppError::Validation("Empty eventType".to_string()));
    }

    let canonical = envelope.event_type.to_ascii_uppercase().replace('-', "_");
    let event = match canonical.as_str() {
        "TRANSFER" => WebhookEvent::Transfer(parse_body(value)?),
        "CONTRACT_EVENT" => WebhookEvent::ContractEvent(parse_body(value)?),
        "WALLET_ACTIVITY" | "ADDRESS_ACTIVITY" => {
            WebhookEvent::WalletActivity(parse_body(value)?)
        }
        _ => WebhookEvent::Unknown(envelope.event_type.clone()),
    };

    Ok(ParsedWebhook { envelope, event })
}

fn parse_body<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::Validation(format!("Malformed webhook body: {}", e)))
}
