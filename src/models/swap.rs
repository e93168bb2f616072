//! Swap records and ingestion outcomes
//!
//! A swap travels through three shapes: the provider webhook payload
//! (modeled in `webhook`), the normalized [`RawSwap`] the parser extracts,
//! and the [`SwapRecord`] a room stores and pushes to viewers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dedup identity for a swap.
///
/// Transaction hash alone for single-swap transactions; hash plus log index
/// when one transaction emits several swaps. Lowercased so mixed-case
/// provider retries still collapse onto one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapId(String);

impl SwapId {
    pub fn new(tx_hash: &str, log_index: Option<u64>) -> Self {
        let hash = tx_hash.trim().to_ascii_lowercase();
        match log_index {
            Some(idx) => Self(format!("{}:{}", hash, idx)),
            None => Self(hash),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized swap extracted from a webhook payload, before enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSwap {
    /// Wallet that initiated the swap (lowercase hex)
    pub wallet_address: String,
    pub tx_hash: String,
    pub log_index: Option<u64>,
    pub token_in: Option<String>,
    pub token_out: Option<String>,
    pub amount_in: Option<Decimal>,
    pub amount_out: Option<Decimal>,
    /// Provider-supplied USD value, present when the asset is a stablecoin
    pub usd_value_in: Option<f64>,
    pub usd_value_out: Option<f64>,
    pub dex_name: String,
    pub network: String,
    pub timestamp: DateTime<Utc>,
}

impl RawSwap {
    pub fn id(&self) -> SwapId {
        SwapId::new(&self.tx_hash, self.log_index)
    }

    /// Validate structural requirements before routing
    pub fn validate(&self) -> Result<(), String> {
        let wallet = self.wallet_address.strip_prefix("0x").unwrap_or_default();
        if wallet.len() != 40 || !wallet.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("Invalid wallet address: {}", self.wallet_address));
        }
        if !self.tx_hash.starts_with("0x") || self.tx_hash.len() < 10 {
            return Err(format!("Invalid transaction hash: {}", self.tx_hash));
        }
        if self.dex_name.is_empty() {
            return Err("Missing DEX name".to_string());
        }
        Ok(())
    }
}

/// Market data attached to a swap after an enrichment lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentData {
    pub usd_value_in: Option<f64>,
    pub usd_value_out: Option<f64>,
    pub token_in_symbol: Option<String>,
    pub token_out_symbol: Option<String>,
    /// Whether the market-data provider lists the traded tokens
    pub verified: Option<bool>,
}

impl EnrichmentData {
    /// True when the lookup produced nothing worth applying
    pub fn is_empty(&self) -> bool {
        self.usd_value_in.is_none()
            && self.usd_value_out.is_none()
            && self.token_in_symbol.is_none()
            && self.token_out_symbol.is_none()
            && self.verified.is_none()
    }
}

/// A swap as stored in a room's log and pushed to viewers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: SwapId,
    pub timestamp: DateTime<Utc>,
    pub wallet_address: String,
    pub tx_hash: String,
    pub log_index: Option<u64>,
    pub token_in: Option<String>,
    pub token_out: Option<String>,
    pub token_in_symbol: Option<String>,
    pub token_out_symbol: Option<String>,
    pub amount_in: Option<Decimal>,
    pub amount_out: Option<Decimal>,
    pub usd_value_in: Option<f64>,
    pub usd_value_out: Option<f64>,
    pub verified: Option<bool>,
    pub dex_name: String,
    /// Set once an enrichment pass has been applied
    pub enriched: bool,
}

impl SwapRecord {
    pub fn from_raw(raw: RawSwap) -> Self {
        Self {
            id: raw.id(),
            timestamp: raw.timestamp,
            wallet_address: raw.wallet_address,
            tx_hash: raw.tx_hash,
            log_index: raw.log_index,
            token_in: raw.token_in,
            token_out: raw.token_out,
            token_in_symbol: None,
            token_out_symbol: None,
            amount_in: raw.amount_in,
            amount_out: raw.amount_out,
            usd_value_in: raw.usd_value_in,
            usd_value_out: raw.usd_value_out,
            verified: None,
            dex_name: raw.dex_name,
            enriched: false,
        }
    }

    /// Whether the async enrichment pass still has work to do
    pub fn needs_enrichment(&self) -> bool {
        self.usd_value_in.is_none()
    }

    /// Merge enrichment fields in place: incoming values win, missing
    /// incoming values leave the stored ones untouched.
    pub fn apply_enrichment(&mut self, data: EnrichmentData) {
        if data.usd_value_in.is_some() {
            self.usd_value_in = data.usd_value_in;
        }
        if data.usd_value_out.is_some() {
            self.usd_value_out = data.usd_value_out;
        }
        if data.token_in_symbol.is_some() {
            self.token_in_symbol = data.token_in_symbol;
        }
        if data.token_out_symbol.is_some() {
            self.token_out_symbol = data.token_out_symbol;
        }
        if data.verified.is_some() {
            self.verified = data.verified;
        }
        self.enriched = true;
    }
}

/// Result of ingesting one swap into one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Inserted, broadcast, and queued for enrichment
    Ingested,
    /// Dedup key already present; nothing changed
    Duplicate,
    /// Wallet is not tracked by this room
    NotTracked,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Ingested => "ingested",
            IngestOutcome::Duplicate => "duplicate",
            IngestOutcome::NotTracked => "not_tracked",
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One page of a room's swap history
#[derive(Debug, Clone, Serialize)]
pub struct SwapHistoryPage {
    pub swaps: Vec<SwapRecord>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}
