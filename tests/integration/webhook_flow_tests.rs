//! Webhook Flow Integration Tests
//!
//! Tests the full inbound webhook path:
//! - HMAC signature verification and replay protection
//! - Payload parsing and swap classification
//! - Routing into rooms with idempotent redelivery
//! - Viewer broadcast and threshold notifications downstream

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware as axum_middleware,
    routing::post,
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

use swaproom::config::{
    AppConfig, EnrichmentConfig, NotificationsConfig, RoomsConfig, SecurityConfig, ServerConfig,
};
use swaproom::enrichment::{EnrichmentError, EnrichmentService};
use swaproom::handlers::{webhook_handler, ApiState};
use swaproom::metrics::MetricsState;
use swaproom::middleware::{hmac_verify, HmacState, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use swaproom::models::{EnrichmentData, NotificationConfig, RawSwap};
use swaproom::notifications::{CompositeNotifier, NotificationService, SwapAlert};
use swaproom::registry::RoomRegistry;

type HmacSha256 = Hmac<Sha256>;

const SECRET: &str = "test-secret";
const WALLET: &str = "0xabcdef0123456789abcdef0123456789abcdef01";
const UNISWAP_V2_ROUTER: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";

/// Sign the canonical payload: timestamp bytes immediately followed by body
fn generate_signature(secret: &str, timestamp: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.as_bytes());
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

struct NoopEnricher;

#[async_trait]
impl EnrichmentService for NoopEnricher {
    async fn enrich(&self, _swap: &RawSwap) -> Result<EnrichmentData, EnrichmentError> {
        Ok(EnrichmentData::default())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    alerts: Mutex<Vec<SwapAlert>>,
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn notify(&self, alert: &SwapAlert) -> anyhow::Result<()> {
        self.alerts.lock().push(alert.clone());
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
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
            webhook_secret: SECRET.to_string(),
            webhook_secret_previous: None,
            max_timestamp_drift_secs: 60,
            webhook_rate_limit: 100,
            webhook_burst_size: 150,
            dev_mode: false,
        },
        rooms: RoomsConfig::default(),
        enrichment: EnrichmentConfig {
            enabled: false,
            ..EnrichmentConfig::default()
        },
        notifications: NotificationsConfig::default(),
    }
}

fn build_registry(notifier: CompositeNotifier) -> RoomRegistry {
    RoomRegistry::new(
        Arc::new(test_config()),
        Arc::new(NoopEnricher),
        Arc::new(notifier),
        Arc::new(MetricsState::new()),
        CancellationToken::new(),
    )
}

fn webhook_app(registry: RoomRegistry, verify_signatures: bool) -> Router {
    let state = Arc::new(ApiState {
        registry,
        config: Arc::new(test_config()),
        metrics: Arc::new(MetricsState::new()),
        started_at: Utc::now(),
    });

    let mut app = Router::new()
        .route("/api/v1/webhook", post(webhook_handler))
        .with_state(state);

    if verify_signatures {
        let hmac_state = Arc::new(HmacState::new(SECRET.to_string(), 60));
        app = app.layer(axum_middleware::from_fn_with_state(hmac_state, hmac_verify));
    }
    app
}

/// Transfer of a stablecoin into a known DEX router: always classifies as
/// a swap with a provider-supplied USD value
fn transfer_payload(wallet: &str, value: f64, hash: &str) -> String {
    json!({
        "webhookId": "wh_evt_1",
        "eventType": "TRANSFER",
        "network": "eth-mainnet",
        "fromAddress": wallet,
        "toAddress": UNISWAP_V2_ROUTER,
        "asset": "USDC",
        "value": value,
        "hash": hash
    })
    .to_string()
}

async fn post_webhook(
    app: &Router,
    body: String,
    headers: &[(&str, String)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/webhook")
        .header("Content-Type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }

    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_signed(app: &Router, body: String) -> (StatusCode, Value) {
    let timestamp = Utc::now().timestamp().to_string();
    let signature = generate_signature(SECRET, &timestamp, &body);
    post_webhook(
        app,
        body,
        &[
            (SIGNATURE_HEADER, signature),
            (TIMESTAMP_HEADER, timestamp),
        ],
    )
    .await
}

// =============================================================================
// SIGNATURE VERIFICATION
// =============================================================================

#[tokio::test]
async fn test_webhook_requires_signature_headers() {
    let app = webhook_app(build_registry(CompositeNotifier::new()), true);

    let (status, body) = post_webhook(
        &app,
        transfer_payload(WALLET, 100.0, "0xaaa1112222"),
        &[(TIMESTAMP_HEADER, Utc::now().timestamp().to_string())],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["reason"], "authentication_failed");
}

#[tokio::test]
async fn test_webhook_rejects_wrong_secret() {
    let app = webhook_app(build_registry(CompositeNotifier::new()), true);
    let payload = transfer_payload(WALLET, 100.0, "0xaaa1112222");

    let timestamp = Utc::now().timestamp().to_string();
    let signature = generate_signature("wrong-secret", &timestamp, &payload);
    let (status, body) = post_webhook(
        &app,
        payload,
        &[(SIGNATURE_HEADER, signature), (TIMESTAMP_HEADER, timestamp)],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "authentication_failed");
}

#[tokio::test]
async fn test_webhook_rejects_stale_timestamp() {
    let app = webhook_app(build_registry(CompositeNotifier::new()), true);
    let payload = transfer_payload(WALLET, 100.0, "0xaaa1112222");

    // Correctly signed, but two minutes old against a 60 second window
    let timestamp = (Utc::now().timestamp() - 120).to_string();
    let signature = generate_signature(SECRET, &timestamp, &payload);
    let (status, _) = post_webhook(
        &app,
        payload,
        &[(SIGNATURE_HEADER, signature), (TIMESTAMP_HEADER, timestamp)],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_accepts_rotated_secret() {
    let registry = build_registry(CompositeNotifier::new());
    let state = Arc::new(ApiState {
        registry,
        config: Arc::new(test_config()),
        metrics: Arc::new(MetricsState::new()),
        started_at: Utc::now(),
    });
    let hmac_state = Arc::new(HmacState::with_rotation(
        vec!["new-secret".to_string(), SECRET.to_string()],
        60,
    ));
    let app = Router::new()
        .route("/api/v1/webhook", post(webhook_handler))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(hmac_state, hmac_verify));

    // Still signing with the previous secret during the grace period
    let (status, _) = post_signed(&app, transfer_payload(WALLET, 100.0, "0xaaa1112222")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

// =============================================================================
// CLASSIFICATION AND ROUTING
// =============================================================================

#[tokio::test]
async fn test_signed_swap_flows_into_room() {
    let registry = build_registry(CompositeNotifier::new());
    let app = webhook_app(registry.clone(), true);

    let room = registry.create_room(None).unwrap();
    room.add_wallet(WALLET.to_string(), None).await.unwrap();

    let (status, body) = post_signed(&app, transfer_payload(WALLET, 5000.0, "0xaaa1112222")).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["swaps"], 1);
    assert_eq!(body["matched_rooms"], 1);
    assert_eq!(body["ingested"], 1);
    assert_eq!(body["duplicates"], 0);

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.stats.swap_count, 1);
    assert_eq!(snapshot.stats.total_volume_usd, 5000.0);

    let history = room.history(1, 50).await.unwrap();
    assert_eq!(history.swaps[0].tx_hash, "0xaaa1112222");
    assert_eq!(history.swaps[0].dex_name, "uniswap-v2");
}

#[tokio::test]
async fn test_webhook_redelivery_is_idempotent() {
    let registry = build_registry(CompositeNotifier::new());
    let app = webhook_app(registry.clone(), false);

    let room = registry.create_room(None).unwrap();
    room.add_wallet(WALLET.to_string(), None).await.unwrap();

    let payload = transfer_payload(WALLET, 5000.0, "0xaaa1112222");
    let (status, body) = post_webhook(&app, payload.clone(), &[]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["ingested"], 1);

    let (status, body) = post_webhook(&app, payload, &[]).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["ingested"], 0);
    assert_eq!(body["duplicates"], 1);

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.stats.swap_count, 1);
    assert_eq!(snapshot.stats.total_volume_usd, 5000.0);
}

#[tokio::test]
async fn test_webhook_matching_is_case_insensitive() {
    let registry = build_registry(CompositeNotifier::new());
    let app = webhook_app(registry.clone(), false);

    let room = registry.create_room(None).unwrap();
    room.add_wallet(WALLET.to_string(), None).await.unwrap();

    let payload = transfer_payload(
        "0xABCDEF0123456789ABCDEF0123456789ABCDEF01",
        250.0,
        "0xaaa1112222",
    );
    let (_, body) = post_webhook(&app, payload, &[]).await;
    assert_eq!(body["ingested"], 1);
}

#[tokio::test]
async fn test_webhook_ignores_non_swap_event() {
    let registry = build_registry(CompositeNotifier::new());
    let app = webhook_app(registry.clone(), false);

    let room = registry.create_room(None).unwrap();
    room.add_wallet(WALLET.to_string(), None).await.unwrap();

    // A plain transfer between wallets never touches a router
    let payload = json!({
        "webhookId": "wh_evt_2",
        "eventType": "TRANSFER",
        "fromAddress": WALLET,
        "toAddress": "0x2222222222222222222222222222222222222222",
        "asset": "USDC",
        "value": 9999.0,
        "hash": "0xbbb2223333"
    })
    .to_string();

    let (status, body) = post_webhook(&app, payload, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["swaps"], 0);

    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.stats.swap_count, 0);
}

#[tokio::test]
async fn test_webhook_rejects_malformed_envelope() {
    let app = webhook_app(build_registry(CompositeNotifier::new()), false);

    let (status, body) = post_webhook(&app, json!({"foo": 1}).to_string(), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "validation_failed");
}

// =============================================================================
// DOWNSTREAM EFFECTS
// =============================================================================

#[tokio::test]
async fn test_swap_broadcast_reaches_attached_viewer() {
    let registry = build_registry(CompositeNotifier::new());
    let app = webhook_app(registry.clone(), false);

    let room = registry.create_room(None).unwrap();
    room.add_wallet(WALLET.to_string(), None).await.unwrap();

    let (tx, mut rx) = mpsc::channel(16);
    room.attach(Uuid::new_v4(), tx).await.unwrap();

    // Replay and presence arrive on attach
    let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(frame["type"], "room_data");
    let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(frame["type"], "presence");

    let payload = transfer_payload(WALLET, 5000.0, "0xaaa1112222");
    post_webhook(&app, payload.clone(), &[]).await;

    let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("broadcast should arrive")
        .unwrap();
    let frame: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(frame["type"], "swap");
    assert_eq!(frame["data"]["tx_hash"], "0xaaa1112222");
    assert_eq!(frame["data"]["usd_value_in"], 5000.0);

    // Redelivery of the same transaction must not produce a second frame
    post_webhook(&app, payload, &[]).await;
    let nothing = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(nothing.is_err(), "duplicate must not broadcast");
}

#[tokio::test]
async fn test_threshold_notification_fires_exactly_once() {
    let recorder = Arc::new(RecordingNotifier::default());
    let mut notifier = CompositeNotifier::new();
    notifier.add_service(recorder.clone());
    let registry = build_registry(notifier);
    let app = webhook_app(registry.clone(), false);

    let room = registry.create_room(None).unwrap();
    room.add_wallet(WALLET.to_string(), None).await.unwrap();
    room.configure_notification(Some(NotificationConfig {
        webhook_url: "https://hooks.example.com/alerts".to_string(),
        usd_threshold: 1000.0,
    }))
    .await
    .unwrap();

    let payload = transfer_payload(WALLET, 5000.0, "0xaaa1112222");
    post_webhook(&app, payload.clone(), &[]).await;

    for _ in 0..100 {
        if recorder.alerts.lock().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    {
        let alerts = recorder.alerts.lock();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].threshold_usd, 1000.0);
        assert_eq!(alerts[0].swap.usd_value_in, Some(5000.0));
        assert_eq!(alerts[0].webhook_url, "https://hooks.example.com/alerts");
    }

    // Redelivery crosses no new threshold
    post_webhook(&app, payload, &[]).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.alerts.lock().len(), 1);
}
