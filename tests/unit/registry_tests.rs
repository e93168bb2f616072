//! Room registry and routing tests
//!
//! Exercises the code -> room table and the wallet membership index:
//! - Code allocation, normalization, and conflicts
//! - Fan-out of one swap to every room tracking the wallet
//! - Address-casing tolerance on the webhook path
//! - Shutdown draining the table

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use swaproom::codes::{CODE_ALPHABET, CODE_LENGTH};
use swaproom::config::{
    AppConfig, EnrichmentConfig, NotificationsConfig, RoomsConfig, SecurityConfig, ServerConfig,
};
use swaproom::enrichment::{EnrichmentError, EnrichmentService};
use swaproom::error::AppError;
use swaproom::metrics::MetricsState;
use swaproom::models::{EnrichmentData, RawSwap};
use swaproom::notifications::CompositeNotifier;
use swaproom::registry::RoomRegistry;

const WALLET: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

struct NoopEnricher;

#[async_trait]
impl EnrichmentService for NoopEnricher {
    async fn enrich(&self, _swap: &RawSwap) -> Result<EnrichmentData, EnrichmentError> {
        Ok(EnrichmentData::default())
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            request_timeout_ms: 30000,
        },
        security: SecurityConfig {
            webhook_secret: "test-secret".to_string(),
            webhook_secret_previous: None,
            max_timestamp_drift_secs: 60,
            webhook_rate_limit: 100,
            webhook_burst_size: 150,
            dev_mode: true,
        },
        rooms: RoomsConfig::default(),
        enrichment: EnrichmentConfig {
            enabled: false,
            ..EnrichmentConfig::default()
        },
        notifications: NotificationsConfig::default(),
    }
}

fn test_registry() -> RoomRegistry {
    test_registry_with(CancellationToken::new())
}

fn test_registry_with(shutdown: CancellationToken) -> RoomRegistry {
    RoomRegistry::new(
        Arc::new(test_config()),
        Arc::new(NoopEnricher),
        Arc::new(CompositeNotifier::new()),
        Arc::new(MetricsState::new()),
        shutdown,
    )
}

fn make_swap(wallet: &str, tx_hash: &str) -> RawSwap {
    RawSwap {
        wallet_address: wallet.to_string(),
        tx_hash: tx_hash.to_string(),
        log_index: None,
        token_in: None,
        token_out: None,
        amount_in: Some(Decimal::new(10, 0)),
        amount_out: None,
        usd_value_in: Some(2500.0),
        usd_value_out: None,
        dex_name: "uniswap-v3".to_string(),
        network: "eth-mainnet".to_string(),
        timestamp: Utc::now(),
    }
}

// =============================================================================
// CODE ALLOCATION
// =============================================================================

#[tokio::test]
async fn test_generated_code_shape() {
    let registry = test_registry();
    let handle = registry.create_room(None).unwrap();

    assert_eq!(handle.code().len(), CODE_LENGTH);
    assert!(handle.code().bytes().all(|b| CODE_ALPHABET.contains(&b)));
}

#[tokio::test]
async fn test_custom_code_is_canonicalized() {
    let registry = test_registry();
    let handle = registry.create_room(Some("ab2cd".to_string())).unwrap();
    assert_eq!(handle.code(), "AB2CD");

    // Lookup tolerates whatever casing the client uses
    assert!(registry.room("ab2cd").is_ok());
    assert!(registry.room("AB2CD").is_ok());
}

#[tokio::test]
async fn test_taken_code_conflicts() {
    let registry = test_registry();
    registry.create_room(Some("AB2CD".to_string())).unwrap();

    let err = registry
        .create_room(Some("ab2cd".to_string()))
        .expect_err("same code in another casing must conflict");
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_invalid_custom_code_rejected() {
    let registry = test_registry();

    // 0, O, 1, I, L are outside the alphabet; length is fixed
    for bad in ["AB0CD", "ABC", "ABCDEF", ""] {
        let err = registry
            .create_room(Some(bad.to_string()))
            .expect_err("invalid code must be rejected");
        assert!(matches!(err, AppError::Validation(_)), "{:?} for {:?}", err, bad);
    }
}

#[tokio::test]
async fn test_unknown_room_not_found() {
    let registry = test_registry();
    let err = registry.room("ZZZZ9").expect_err("no such room");
    assert!(matches!(err, AppError::NotFound(_)), "got {:?}", err);
}

// =============================================================================
// SWAP ROUTING
// =============================================================================

#[tokio::test]
async fn test_route_swap_reaches_every_tracking_room() {
    let registry = test_registry();
    let first = registry.create_room(None).unwrap();
    let second = registry.create_room(None).unwrap();
    first.add_wallet(WALLET.to_string(), None).await.unwrap();
    second.add_wallet(WALLET.to_string(), None).await.unwrap();

    let summary = registry
        .route_swap(make_swap(WALLET, "0xaaa1112222"))
        .await
        .unwrap();

    assert_eq!(summary.matched_rooms, 2);
    assert_eq!(summary.ingested, 2);
    assert_eq!(summary.duplicates, 0);

    assert_eq!(first.history(1, 50).await.unwrap().total, 1);
    assert_eq!(second.history(1, 50).await.unwrap().total, 1);
}

#[tokio::test]
async fn test_route_swap_isolates_rooms() {
    let registry = test_registry();
    let tracking = registry.create_room(None).unwrap();
    let other = registry.create_room(None).unwrap();
    tracking.add_wallet(WALLET.to_string(), None).await.unwrap();
    other
        .add_wallet("0x1111111111111111111111111111111111111111".to_string(), None)
        .await
        .unwrap();

    registry
        .route_swap(make_swap(WALLET, "0xaaa1112222"))
        .await
        .unwrap();

    assert_eq!(tracking.history(1, 50).await.unwrap().total, 1);
    assert_eq!(other.history(1, 50).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_route_swap_counts_duplicates_per_room() {
    let registry = test_registry();
    let handle = registry.create_room(None).unwrap();
    handle.add_wallet(WALLET.to_string(), None).await.unwrap();

    let first = registry
        .route_swap(make_swap(WALLET, "0xaaa1112222"))
        .await
        .unwrap();
    assert_eq!(first.ingested, 1);

    let second = registry
        .route_swap(make_swap(WALLET, "0xaaa1112222"))
        .await
        .unwrap();
    assert_eq!(second.matched_rooms, 1);
    assert_eq!(second.ingested, 0);
    assert_eq!(second.duplicates, 1);
}

#[tokio::test]
async fn test_route_swap_normalizes_wallet_casing() {
    let registry = test_registry();
    let handle = registry.create_room(None).unwrap();
    handle.add_wallet(WALLET.to_string(), None).await.unwrap();

    // Provider payloads may carry checksum casing
    let summary = registry
        .route_swap(make_swap(
            "0xABCDEF0123456789ABCDEF0123456789ABCDEF01",
            "0xaaa1112222",
        ))
        .await
        .unwrap();

    assert_eq!(summary.ingested, 1);
}

#[tokio::test]
async fn test_route_swap_without_tracking_room_matches_nothing() {
    let registry = test_registry();
    registry.create_room(None).unwrap();

    let summary = registry
        .route_swap(make_swap(WALLET, "0xaaa1112222"))
        .await
        .unwrap();

    assert_eq!(summary.matched_rooms, 0);
    assert_eq!(summary.ingested, 0);
}

#[tokio::test]
async fn test_route_swap_rejects_malformed() {
    let registry = test_registry();

    let err = registry
        .route_swap(make_swap("0x123", "0xaaa1112222"))
        .await
        .expect_err("short wallet must be rejected");
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);

    let err = registry
        .route_swap(make_swap(WALLET, "nope"))
        .await
        .expect_err("malformed hash must be rejected");
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_removed_wallet_leaves_the_index() {
    let registry = test_registry();
    let handle = registry.create_room(None).unwrap();
    handle.add_wallet(WALLET.to_string(), None).await.unwrap();
    handle.remove_wallet(WALLET.to_string()).await.unwrap();

    let summary = registry
        .route_swap(make_swap(WALLET, "0xaaa1112222"))
        .await
        .unwrap();
    assert_eq!(summary.matched_rooms, 0);
}

// =============================================================================
// SHUTDOWN
// =============================================================================

#[tokio::test]
async fn test_shutdown_drains_the_registry() {
    let shutdown = CancellationToken::new();
    let registry = test_registry_with(shutdown.clone());
    let handle = registry.create_room(None).unwrap();
    handle.add_wallet(WALLET.to_string(), None).await.unwrap();
    assert_eq!(registry.active_rooms(), 1);

    shutdown.cancel();

    // The actor unregisters itself as it winds down
    for _ in 0..100 {
        if registry.active_rooms() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(registry.active_rooms(), 0);

    let summary = registry
        .route_swap(make_swap(WALLET, "0xaaa1112222"))
        .await
        .unwrap();
    assert_eq!(summary.matched_rooms, 0, "closed rooms must not route");

    let err = registry.room(handle.code()).expect_err("room is gone");
    assert!(matches!(err, AppError::NotFound(_)));
}
