//! Swap classification
//!
//! Decides whether a parsed webhook event represents a DEX swap and, when
//! it does, extracts normalized [`RawSwap`] records. Two heuristics, either
//! sufficient: the counterparty/contract address appears in the known
//! router table, or the decoded method name matches a swap-method pattern.
//! Missing optional fields never disqualify an event; the extracted swap
//! simply carries partial data for enrichment to fill later.

use crate::constants::{routers, STABLE_SYMBOLS};
use crate::models::RawSwap;
use crate::webhook::{
    ActivityItem, ContractEvent, ParsedWebhook, TransferEvent, WebhookEvent,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Router address (lowercase) -> venue name
static KNOWN_ROUTERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (routers::UNISWAP_V2, "uniswap-v2"),
        (routers::UNISWAP_V3, "uniswap-v3"),
        (routers::UNISWAP_UNIVERSAL, "uniswap-universal"),
        (routers::SUSHISWAP, "sushiswap"),
        (routers::ONEINCH_V5, "1inch-v5"),
        (routers::ZEROX_PROXY, "0x"),
    ])
});

/// Method names that are a swap on their own
static SWAP_METHODS_EXACT: &[&str] = &["swap", "multicall"];

/// Method-name prefixes that mark a swap ("swapExactTokensForTokens",
/// "exactInputSingle", ...)
static SWAP_METHOD_PREFIXES: &[&str] = &["swapexact", "swaptokens", "exactinput", "exactoutput"];

/// Outcome of classifying one webhook event
#[derive(Debug, Clone)]
pub enum Classification {
    /// One or more swaps extracted (wallet-activity events can carry several)
    Swaps(Vec<RawSwap>),
    NotASwap,
}

/// Classify a parsed webhook event
pub fn classify(parsed: &ParsedWebhook) -> Classification {
    let timestamp = parsed.envelope.created_at.unwrap_or_else(Utc::now);
    let network = parsed.envelope.network.clone();

    let swaps = match &parsed.event {
        WebhookEvent::Transfer(transfer) => {
            classify_transfer(transfer, &network, timestamp).into_iter().collect()
        }
        WebhookEvent::ContractEvent(event) => {
            classify_contract_event(event, &network, timestamp).into_iter().collect()
        }
        WebhookEvent::WalletActivity(activity) => activity
            .activity
            .iter()
            .filter_map(|item| classify_activity_item(item, &network, timestamp))
            .collect(),
        WebhookEvent::Unknown(_) => Vec::new(),
    };

    if swaps.is_empty() {
        Classification::NotASwap
    } else {
        Classification::Swaps(swaps)
    }
}

/// Look up a router by address, tolerating checksum casing
fn router_name(address: &str) -> Option<&'static str> {
    KNOWN_ROUTERS
        .get(address.to_ascii_lowercase().as_str())
        .copied()
}

/// Whether a decoded method name marks a swap
pub fn is_swap_method(method: &str) -> bool {
    let method = method.trim().to_ascii_lowercase();
    if method.is_empty() {
        return false;
    }
    SWAP_METHODS_EXACT.contains(&method.as_str())
        || SWAP_METHOD_PREFIXES
            .iter()
            .any(|prefix| method.starts_with(prefix))
}

/// USD value for provider-reported stablecoin amounts
fn stable_usd(asset: Option<&str>, value: Option<f64>) -> Option<f64> {
    let symbol = asset?.to_ascii_uppercase();
    if STABLE_SYMBOLS.contains(&symbol.as_str()) {
        value
    } else {
        None
    }
}

/// A plain transfer is a swap leg only when it targets a known router
fn classify_transfer(
    transfer: &TransferEvent,
    network: &str,
    timestamp: DateTime<Utc>,
) -> Option<RawSwap> {
    let to = transfer.to_address.as_deref()?;
    let dex = router_name(to)?;

    Some(RawSwap {
        wallet_address: transfer.from_address.to_ascii_lowercase(),
        tx_hash: transfer.hash.clone(),
        log_index: transfer.log_index,
        token_in: None,
        token_out: None,
        amount_in: transfer.value.and_then(Decimal::from_f64_retain),
        amount_out: None,
        usd_value_in: stable_usd(transfer.asset.as_deref(), transfer.value),
        usd_value_out: None,
        dex_name: dex.to_string(),
        network: network.to_string(),
        timestamp,
    })
}

fn classify_contract_event(
    event: &ContractEvent,
    network: &str,
    timestamp: DateTime<Utc>,
) -> Option<RawSwap> {
    let by_router = router_name(&event.contract_address);
    let by_method = event
        .method_name
        .as_deref()
        .is_some_and(is_swap_method);
    if by_router.is_none() && !by_method {
        return None;
    }

    // Without an initiating wallet there is nothing to match rooms against
    let wallet = event.from_address.as_deref()?;

    Some(RawSwap {
        wallet_address: wallet.to_ascii_lowercase(),
        tx_hash: event.tx_hash.clone(),
        log_index: event.log_index,
        token_in: event.token_in.as_deref().map(str::to_ascii_lowercase),
        token_out: event.token_out.as_deref().map(str::to_ascii_lowercase),
        amount_in: event.amount_in.and_then(Decimal::from_f64_retain),
        amount_out: event.amount_out.and_then(Decimal::from_f64_retain),
        usd_value_in: None,
        usd_value_out: None,
        dex_name: by_router.unwrap_or("unknown").to_string(),
        network: network.to_string(),
        timestamp,
    })
}

fn classify_activity_item(
    item: &ActivityItem,
    network: &str,
    timestamp: DateTime<Utc>,
) -> Option<RawSwap> {
    let by_router = item.to_address.as_deref().and_then(router_name);
    let by_method = item.method.as_deref().is_some_and(is_swap_method);
    if by_router.is_none() && !by_method {
        return None;
    }

    let token_in = item
        .raw_contract
        .as_ref()
        .and_then(|c| c.address.as_deref())
        .map(str::to_ascii_lowercase);

    Some(RawSwap {
        wallet_address: item.from_address.to_ascii_lowercase(),
        tx_hash: item.hash.clone(),
        log_index: item.log_index,
        token_in,
        token_out: None,
        amount_in: item.value.and_then(Decimal::from_f64_retain),
        amount_out: None,
        usd_value_in: stable_usd(item.asset.as_deref(), item.value),
        usd_value_out: None,
        dex_name: by_router.unwrap_or("unknown").to_string(),
        network: network.to_string(),
        timestamp,
    })
}
