//! Swaproom Relay - webhook-driven swap monitoring with ephemeral rooms
//!
//! This is the main entry point. It wires the room registry, the inbound
//! webhook route, the room REST surface, and the per-room WebSocket feed
//! into one Axum server.

mod codes;
mod config;
mod constants;
mod enrichment;
mod error;
mod handlers;
mod metrics;
mod middleware;
mod models;
mod notifications;
mod registry;
mod room;
mod webhook;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::config::AppConfig;
use crate::enrichment::Enricher;
use crate::handlers::{
    add_wallet, configure_notification, create_room, extend_room, get_room, health_check,
    health_simple, remove_notification, remove_wallet, swap_history, webhook_handler, ws_handler,
    ApiState,
};
use crate::metrics::{metrics_router, MetricsState};
use crate::middleware::{HmacState, ProxyAwareKeyExtractor};
use crate::notifications::{CompositeNotifier, WebhookNotifier};
use crate::registry::RoomRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    tracing::info!("Starting Swaproom Relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(load_config()?);
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics = Arc::new(MetricsState::new());
    tracing::info!("Metrics registry initialized");

    // Initialize enrichment client
    let enricher = Arc::new(Enricher::new(&config.enrichment)?);
    tracing::info!(
        enabled = config.enrichment.enabled,
        timeout_ms = config.enrichment.timeout_ms,
        "Enrichment client initialized"
    );

    // Initialize notification dispatch
    let mut notifier = CompositeNotifier::new();
    notifier.add_service(Arc::new(WebhookNotifier::new(&config.notifications)));
    let notifier = Arc::new(notifier);
    tracing::info!(
        enabled = config.notifications.enabled,
        "Notification dispatcher initialized"
    );

    // Shutdown token shared with every room actor
    let shutdown = CancellationToken::new();

    // Room registry
    let registry = RoomRegistry::new(
        config.clone(),
        enricher,
        notifier,
        metrics.clone(),
        shutdown.clone(),
    );
    tracing::info!("Room registry initialized");

    // Shared handler state
    let api_state = Arc::new(ApiState {
        registry,
        config: config.clone(),
        metrics: metrics.clone(),
        started_at: Utc::now(),
    });

    // Rate limiter for the webhook route
    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(ProxyAwareKeyExtractor)
            .per_second(config.security.webhook_rate_limit as u64)
            .burst_size(config.security.webhook_burst_size)
            .finish()
            .expect("Failed to create rate limiter config"),
    );
    tracing::info!(
        rate_limit = config.security.webhook_rate_limit,
        burst_size = config.security.webhook_burst_size,
        "Rate limiting configured"
    );

    // Webhook route: signature check innermost, rate limiting outermost
    let mut webhook_routes = Router::new()
        .route("/webhook", post(webhook_handler))
        .with_state(api_state.clone());

    if config.security.dev_mode {
        tracing::warn!("Dev mode: webhook signature verification disabled");
    } else {
        let hmac_state = Arc::new(HmacState::with_rotation(
            config.security.get_all_secrets(),
            config.security.max_timestamp_drift_secs,
        ));
        if hmac_state.is_rotation_active() {
            tracing::info!("Secret rotation grace period active");
        }
        webhook_routes = webhook_routes.layer(axum_middleware::from_fn_with_state(
            hmac_state,
            middleware::hmac_verify,
        ));
    }
    let webhook_routes = webhook_routes.layer(GovernorLayer {
        config: rate_limit_config,
    });

    // Room REST surface and detailed health
    let room_routes = Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/:code", get(get_room))
        .route("/rooms/:code/extend", post(extend_room))
        .route("/rooms/:code/wallets", post(add_wallet))
        .route("/rooms/:code/wallets/:address", delete(remove_wallet))
        .route(
            "/rooms/:code/notifications",
            put(configure_notification).delete(remove_notification),
        )
        .route("/rooms/:code/swaps", get(swap_history))
        .route("/health", get(health_check))
        .with_state(api_state.clone());

    // Live feed, simple health, Prometheus text endpoint
    let ws_routes = Router::new()
        .route("/ws/:code", get(ws_handler))
        .with_state(api_state);
    let root_routes = Router::new().route("/health", get(health_simple));
    let metrics_routes = metrics_router().with_state(metrics);

    let app = Router::new()
        .nest("/api/v1", room_routes.merge(webhook_routes))
        .merge(ws_routes)
        .merge(root_routes)
        .merge(metrics_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server address");

    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then cancel every room actor
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to register Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to register SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, closing rooms");
    shutdown.cancel();
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swaproom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<AppConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}
