//! Room state building blocks: wallets, labels, stats, snapshots

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalize a wallet address to its canonical form: `0x` + 40 lowercase
/// hex characters.
///
/// EVM addresses are case-insensitive (checksum casing is display-only), so
/// every entry point funnels through this before storage or comparison.
pub fn normalize_wallet_address(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| {
            AppError::Validation(format!("Wallet address must start with 0x: {}", trimmed))
        })?;

    if hex_part.len() != 40 {
        return Err(AppError::Validation(format!(
            "Wallet address must contain 40 hex characters, got {}",
            hex_part.len()
        )));
    }
    if !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AppError::Validation(format!(
            "Wallet address contains non-hex characters: {}",
            trimmed
        )));
    }

    Ok(format!("0x{}", hex_part.to_ascii_lowercase()))
}

/// Validate a wallet label against the configured length cap
pub fn validate_label(label: &str, max_chars: usize) -> Result<(), AppError> {
    let count = label.chars().count();
    if count > max_chars {
        return Err(AppError::Validation(format!(
            "Label exceeds {} characters (got {})",
            max_chars, count
        )));
    }
    Ok(())
}

/// One tracked wallet with its optional display label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Aggregate counters maintained incrementally as swaps arrive
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RoomStats {
    pub swap_count: u64,
    pub total_volume_usd: f64,
}

impl RoomStats {
    /// Record a freshly ingested swap
    pub fn record(&mut self, usd_value_in: Option<f64>) {
        self.swap_count += 1;
        self.total_volume_usd += usd_value_in.unwrap_or(0.0);
    }

    /// Apply a volume correction when enrichment fills in a USD value
    pub fn add_volume(&mut self, delta: f64) {
        self.total_volume_usd += delta;
    }
}

/// Per-room outbound notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub webhook_url: String,
    pub usd_threshold: f64,
}

impl NotificationConfig {
    /// Validate URL shape and threshold bounds
    pub fn validate(&self, min_threshold: f64, max_threshold: f64) -> Result<(), AppError> {
        let url = self.webhook_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AppError::Validation(
                "Notification webhook URL must be http(s)".to_string(),
            ));
        }
        if url.len() > 2048 {
            return Err(AppError::Validation(
                "Notification webhook URL is too long".to_string(),
            ));
        }
        if !self.usd_threshold.is_finite() {
            return Err(AppError::Validation(
                "Notification threshold must be a finite number".to_string(),
            ));
        }
        if self.usd_threshold < min_threshold || self.usd_threshold > max_threshold {
            return Err(AppError::Validation(format!(
                "Notification threshold must be between {} and {} USD",
                min_threshold, max_threshold
            )));
        }
        Ok(())
    }
}

/// Point-in-time view of a room, returned from the API and replayed to
/// newly attached viewers. Webhook URLs stay private to the room config.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub code: String,
    pub wallets: Vec<WalletEntry>,
    pub stats: RoomStats,
    pub notifications_enabled: bool,
    pub viewer_count: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
