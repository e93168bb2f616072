//! Room WebSocket protocol
//!
//! Server-to-viewer events and viewer-to-server commands. Every server
//! event is serialized once per broadcast and shared across connections.

use crate::models::{RoomSnapshot, SwapRecord, WalletEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events pushed to room viewers
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Full room state, sent on attach and on sync request
    #[serde(rename = "room_data")]
    RoomData(RoomDataPayload),

    /// New swap ingested
    #[serde(rename = "swap")]
    Swap(SwapRecord),

    /// Existing swap re-broadcast after enrichment
    #[serde(rename = "swap_updated")]
    SwapUpdated(SwapRecord),

    /// Wallet added to the tracked list
    #[serde(rename = "wallet_added")]
    WalletAdded(WalletEntry),

    /// Wallet removed from the tracked list
    #[serde(rename = "wallet_removed")]
    WalletRemoved(WalletRemovedData),

    /// Viewer count changed
    #[serde(rename = "presence")]
    Presence(PresenceData),

    /// Room is about to expire
    #[serde(rename = "expiring")]
    Expiring(ExpiringData),

    /// A viewer command failed
    #[serde(rename = "error")]
    Error(ErrorData),
}

#[derive(Clone, Debug, Serialize)]
pub struct RoomDataPayload {
    pub room: RoomSnapshot,
    /// Most recent swaps, newest first
    pub recent_swaps: Vec<SwapRecord>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WalletRemovedData {
    pub address: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PresenceData {
    pub viewers: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExpiringData {
    pub expires_at: DateTime<Utc>,
    pub seconds_left: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorData {
    pub code: String,
    pub message: String,
}

/// Commands a viewer may send over the socket
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Ask for a fresh room_data frame
    #[serde(rename = "request_sync")]
    RequestSync,

    /// Add a wallet to the tracked list
    #[serde(rename = "add_wallet")]
    AddWallet(AddWalletData),

    /// Remove a wallet from the tracked list
    #[serde(rename = "remove_wallet")]
    RemoveWallet(RemoveWalletData),
}

#[derive(Clone, Debug, Deserialize)]
pub struct AddWalletData {
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RemoveWalletData {
    pub address: String,
}
