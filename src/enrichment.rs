//! Market-data enrichment
//!
//! Resolves USD values and token symbols for ingested swaps via the
//! DexScreener token endpoint. Quotes are cached in an LRU with TTL so a
//! burst of swaps in the same pair costs one upstream request. Lookups are
//! always driven from a detached task with a deadline; this module never
//! blocks swap ingestion.

use crate::config::EnrichmentConfig;
use crate::error::AppError;
use crate::models::{EnrichmentData, RawSwap};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::num::NonZeroUsize;

/// A cached market quote for one token
#[derive(Debug, Clone)]
pub struct MarketQuote {
    /// Price in USD
    pub price_usd: f64,
    /// Token symbol as listed on the aggregator
    pub symbol: Option<String>,
    /// Liquidity of the deepest pair, in USD
    pub liquidity_usd: Option<f64>,
}

impl MarketQuote {
    /// A token counts as verified when its deepest pair has real liquidity
    pub fn verified(&self) -> bool {
        self.liquidity_usd.is_some_and(|usd| usd > 0.0)
    }
}

#[derive(Clone)]
struct CacheEntry {
    quote: MarketQuote,
    cached_at: DateTime<Utc>,
}

/// Enrichment lookup errors
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// JSON parsing failed
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Rate limited
    #[error("Rate limited by market data API")]
    RateLimited,

    /// No priced pair found for the token
    #[error("Token not listed on market data API")]
    NotListed,
}

/// Lookup seam for market data, so tests can substitute a stub
#[async_trait]
pub trait EnrichmentService: Send + Sync {
    /// Resolve USD values and symbols for a swap's token legs
    async fn enrich(&self, swap: &RawSwap) -> Result<EnrichmentData, EnrichmentError>;
}

/// DexScreener-backed enrichment with an LRU quote cache
pub struct Enricher {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl Enricher {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let cap = NonZeroUsize::new(config.cache_capacity)
            .unwrap_or(NonZeroUsize::new(1024).unwrap());

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(LruCache::new(cap)),
            ttl: Duration::seconds(config.cache_ttl_seconds),
        })
    }

    /// Get a cached quote if it exists and hasn't expired
    fn cached_quote(&self, key: &str) -> Option<MarketQuote> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.get(key) {
            let age = Utc::now() - entry.cached_at;
            if age < self.ttl {
                tracing::trace!(token = key, age_secs = age.num_seconds(), "Quote cache hit");
                return Some(entry.quote.clone());
            }
            tracing::trace!(token = key, "Quote cache entry expired");
            cache.pop(key);
        }
        None
    }

    fn insert_quote(&self, key: String, quote: MarketQuote) {
        let entry = CacheEntry {
            quote,
            cached_at: Utc::now(),
        };
        self.cache.lock().put(key, entry);
    }

    /// Resolve a quote for one token address, cache first
    async fn quote_for(&self, address: &str) -> Result<MarketQuote, EnrichmentError> {
        let key = address.to_ascii_lowercase();

        if let Some(quote) = self.cached_quote(&key) {
            return Ok(quote);
        }

        let url = format!("{}/{}", self.base_url, key);
        tracing::debug!(token = %key, url = %url, "Fetching market quote");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrichmentError::HttpError(format!("Quote request failed: {}", e)))?;

        if response.status() == 429 {
            return Err(EnrichmentError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(EnrichmentError::HttpError(format!(
                "Market data API returned error: {}",
                response.status()
            )));
        }

        let data: ScreenerResponse = response
            .json()
            .await
            .map_err(|e| EnrichmentError::ParseError(format!("Failed to parse quote response: {}", e)))?;

        let quote = quote_from_pairs(data.pairs.unwrap_or_default(), &key)?;
        self.insert_quote(key, quote.clone());
        Ok(quote)
    }
}

#[async_trait]
impl EnrichmentService for Enricher {
    async fn enrich(&self, swap: &RawSwap) -> Result<EnrichmentData, EnrichmentError> {
        if swap.token_in.is_none() && swap.token_out.is_none() {
            return Err(EnrichmentError::NotListed);
        }

        let mut last_error = None;

        let quote_in = match &swap.token_in {
            Some(address) => match self.quote_for(address).await {
                Ok(quote) => Some(quote),
                Err(e) => {
                    last_error = Some(e);
                    None
                }
            },
            None => None,
        };
        let quote_out = match &swap.token_out {
            Some(address) => match self.quote_for(address).await {
                Ok(quote) => Some(quote),
                Err(e) => {
                    last_error = Some(e);
                    None
                }
            },
            None => None,
        };

        // Partial data is still worth applying; fail only when nothing resolved
        if quote_in.is_none() && quote_out.is_none() {
            return Err(last_error.unwrap_or(EnrichmentError::NotListed));
        }

        let verified = [&quote_in, &quote_out]
            .into_iter()
            .flatten()
            .all(MarketQuote::verified);

        Ok(EnrichmentData {
            usd_value_in: leg_usd_value(swap.amount_in, quote_in.as_ref()),
            usd_value_out: leg_usd_value(swap.amount_out, quote_out.as_ref()),
            token_in_symbol: quote_in.and_then(|q| q.symbol),
            token_out_symbol: quote_out.and_then(|q| q.symbol),
            verified: Some(verified),
        })
    }
}

/// USD value of one swap leg, using Decimal for the multiply
fn leg_usd_value(amount: Option<Decimal>, quote: Option<&MarketQuote>) -> Option<f64> {
    let amount = amount?;
    let price = Decimal::from_f64_retain(quote?.price_usd)?;
    (amount * price).to_f64()
}

/// Pick the deepest pair quoting the token as base, and turn it into a quote
fn quote_from_pairs(
    pairs: Vec<ScreenerPair>,
    address: &str,
) -> Result<MarketQuote, EnrichmentError> {
    let best = pairs
        .into_iter()
        .filter(|pair| pair.base_token.address.eq_ignore_ascii_case(address))
        .filter(|pair| pair.price_usd.is_some())
        .max_by(|a, b| {
            let la = a.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
            let lb = b.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
            la.total_cmp(&lb)
        })
        .ok_or(EnrichmentError::NotListed)?;

    let price_text = best.price_usd.unwrap_or_default();
    let price_usd: f64 = price_text
        .parse()
        .map_err(|_| EnrichmentError::ParseError(format!("Bad priceUsd value: {}", price_text)))?;

    Ok(MarketQuote {
        price_usd,
        symbol: best.base_token.symbol,
        liquidity_usd: best.liquidity.and_then(|l| l.usd),
    })
}

/// DexScreener token endpoint response
#[derive(Debug, Deserialize)]
struct ScreenerResponse {
    pairs: Option<Vec<ScreenerPair>>,
}

#[derive(Debug, Deserialize)]
struct ScreenerPair {
    #[serde(rename = "baseToken")]
    base_token: ScreenerToken,
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    liquidity: Option<ScreenerLiquidity>,
}

#[derive(Debug, Deserialize)]
struct ScreenerToken {
    address: String,
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScreenerLiquidity {
    usd: Option<f64>,
}
