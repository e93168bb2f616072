//! Swaproom Relay Library
//!
//! Webhook-driven swap monitoring with ephemeral, code-addressed rooms.
//! This library exposes core modules for testing.

pub mod codes;
pub mod config;
pub mod constants;
pub mod enrichment;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod registry;
pub mod room;
pub mod webhook;

// Re-export commonly used types for tests
pub use config::AppConfig;
pub use enrichment::{Enricher, EnrichmentError, EnrichmentService, MarketQuote};
pub use error::{AppError, AppResult};
pub use metrics::MetricsState;
pub use middleware::{HmacState, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use models::{
    EnrichmentData, IngestOutcome, NotificationConfig, RawSwap, RoomSnapshot, SwapId, SwapRecord,
    WalletEntry,
};
pub use notifications::{CompositeNotifier, NotificationService, SwapAlert, WebhookNotifier};
pub use registry::{RoomRegistry, RouteSummary};
pub use room::{ClientMessage, ConnectionPool, RoomHandle, ServerMessage};
