//! Configuration management for the swaproom relay
//!
//! Loads configuration from YAML files and environment variables.
//! Environment variables override YAML values.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security settings
    pub security: SecurityConfig,
    /// Room lifecycle and sizing
    #[serde(default)]
    pub rooms: RoomsConfig,
    /// Market-data enrichment settings
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Outbound notification settings
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30000
}

/// Security configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// HMAC secret for webhook verification (loaded from env)
    #[serde(default)]
    pub webhook_secret: String,
    /// Previous HMAC secret (for rotation grace period)
    #[serde(default)]
    pub webhook_secret_previous: Option<String>,
    /// Maximum timestamp drift in seconds for replay protection
    #[serde(default = "default_max_timestamp_drift")]
    pub max_timestamp_drift_secs: i64,
    /// Rate limit: max requests per second
    #[serde(default = "default_webhook_rate_limit")]
    pub webhook_rate_limit: u32,
    /// Rate limit: burst size
    #[serde(default = "default_webhook_burst")]
    pub webhook_burst_size: u32,
    /// Skip signature verification (local development only)
    #[serde(default)]
    pub dev_mode: bool,
}

impl SecurityConfig {
    /// Get all valid secrets for HMAC verification (current + previous)
    pub fn get_all_secrets(&self) -> Vec<String> {
        let mut secrets = vec![self.webhook_secret.clone()];
        if let Some(ref prev) = self.webhook_secret_previous {
            if !prev.is_empty() {
                secrets.push(prev.clone());
            }
        }
        secrets
    }
}

fn default_max_timestamp_drift() -> i64 {
    60
}

fn default_webhook_rate_limit() -> u32 {
    100
}

fn default_webhook_burst() -> u32 {
    150
}

/// Room lifecycle and sizing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsConfig {
    /// Maximum tracked wallets per room
    #[serde(default = "default_max_wallets")]
    pub max_wallets: usize,
    /// Maximum retained swaps per room (most-recent-first buffer)
    #[serde(default = "default_swap_log_cap")]
    pub swap_log_cap: usize,
    /// Maximum wallet label length in characters
    #[serde(default = "default_label_max_chars")]
    pub label_max_chars: usize,
    /// Initial room lifetime in hours
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Maximum hours a single extend call may add
    #[serde(default = "default_max_extension_hours")]
    pub max_extension_hours: i64,
    /// Absolute lifetime cap in hours, measured from creation
    #[serde(default = "default_max_lifetime_hours")]
    pub max_lifetime_hours: i64,
    /// Number of recent swaps replayed to a newly attached viewer
    #[serde(default = "default_replay_swaps")]
    pub replay_swaps: usize,
    /// Lead time for the `expiring` warning broadcast, in seconds
    #[serde(default = "default_expiry_warning_secs")]
    pub expiry_warning_secs: i64,
    /// Capacity of each room actor's command mailbox
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
    /// Per-viewer outbound frame buffer
    #[serde(default = "default_connection_buffer")]
    pub connection_buffer: usize,
}

fn default_max_wallets() -> usize {
    50
}

fn default_swap_log_cap() -> usize {
    200
}

fn default_label_max_chars() -> usize {
    100
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_max_extension_hours() -> i64 {
    24
}

fn default_max_lifetime_hours() -> i64 {
    72
}

fn default_replay_swaps() -> usize {
    50
}

fn default_expiry_warning_secs() -> i64 {
    600
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_connection_buffer() -> usize {
    64
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_wallets: default_max_wallets(),
            swap_log_cap: default_swap_log_cap(),
            label_max_chars: default_label_max_chars(),
            ttl_hours: default_ttl_hours(),
            max_extension_hours: default_max_extension_hours(),
            max_lifetime_hours: default_max_lifetime_hours(),
            replay_swaps: default_replay_swaps(),
            expiry_warning_secs: default_expiry_warning_secs(),
            mailbox_capacity: default_mailbox_capacity(),
            connection_buffer: default_connection_buffer(),
        }
    }
}

/// Market-data enrichment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Whether enrichment lookups run at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Market-data API base URL
    #[serde(default = "default_enrichment_api_url")]
    pub api_url: String,
    /// Hard bound on one enrichment pass, in milliseconds
    #[serde(default = "default_enrichment_timeout")]
    pub timeout_ms: u64,
    /// Quote cache capacity (token addresses)
    #[serde(default = "default_quote_cache_capacity")]
    pub cache_capacity: usize,
    /// Quote cache TTL in seconds
    #[serde(default = "default_quote_cache_ttl")]
    pub cache_ttl_seconds: i64,
}

fn default_enrichment_api_url() -> String {
    "https://api.dexscreener.com/latest/dex".to_string()
}

fn default_enrichment_timeout() -> u64 {
    1500
}

fn default_quote_cache_capacity() -> usize {
    1024
}

fn default_quote_cache_ttl() -> i64 {
    60
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_enrichment_api_url(),
            timeout_ms: default_enrichment_timeout(),
            cache_capacity: default_quote_cache_capacity(),
            cache_ttl_seconds: default_quote_cache_ttl(),
        }
    }
}

/// Outbound notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Whether outbound notification dispatch runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// HTTP timeout for a single notification POST, in seconds
    #[serde(default = "default_notification_timeout")]
    pub request_timeout_secs: u64,
    /// Minimum seconds between notifications for the same room
    #[serde(default = "default_notification_rate_limit")]
    pub rate_limit_seconds: u64,
    /// Lowest accepted per-room USD threshold
    #[serde(default = "default_min_threshold")]
    pub min_threshold_usd: f64,
    /// Highest accepted per-room USD threshold
    #[serde(default = "default_max_threshold")]
    pub max_threshold_usd: f64,
}

fn default_notification_timeout() -> u64 {
    10
}

fn default_notification_rate_limit() -> u64 {
    30
}

fn default_min_threshold() -> f64 {
    1.0
}

fn default_max_threshold() -> f64 {
    1_000_000_000.0
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout_secs: default_notification_timeout(),
            rate_limit_seconds: default_notification_rate_limit(),
            min_threshold_usd: default_min_threshold(),
            max_threshold_usd: default_max_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (SWAPROOM_*)
    /// 2. config/config.yaml (if exists)
    /// 3. config.yaml (if exists)
    /// 4. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.request_timeout_ms", 30000)?
            .set_default("security.max_timestamp_drift_secs", 60)?
            .set_default("security.webhook_rate_limit", 100)?
            .set_default("security.webhook_burst_size", 150)?
            .set_default("rooms.max_wallets", 50)?
            .set_default("rooms.swap_log_cap", 200)?
            .set_default("rooms.ttl_hours", 24)?
            .set_default("enrichment.timeout_ms", 1500)?
            // Load from config files (lower priority)
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("config/config").required(false))
            // Override with environment variables (highest priority - loaded last)
            // SWAPROOM_SERVER__PORT=8081 -> server.port = 8081
            // SWAPROOM_SECURITY__DEV_MODE=true -> security.dev_mode = true
            .add_source(
                Environment::with_prefix("SWAPROOM")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Check webhook secret is set
        if self.security.webhook_secret.is_empty() && !self.security.dev_mode {
            return Err(ConfigError::Message(
                "Webhook secret must be set via SWAPROOM_SECURITY__WEBHOOK_SECRET".to_string(),
            ));
        }

        if self.rooms.ttl_hours < 1 {
            return Err(ConfigError::Message(
                "Room TTL must be at least one hour".to_string(),
            ));
        }

        // Extensions must have somewhere to go
        if self.rooms.max_lifetime_hours < self.rooms.ttl_hours {
            return Err(ConfigError::Message(
                "Room lifetime cap must be at least the initial TTL".to_string(),
            ));
        }

        if self.rooms.replay_swaps > self.rooms.swap_log_cap {
            return Err(ConfigError::Message(
                "Replay count cannot exceed the swap log cap".to_string(),
            ));
        }

        if self.notifications.min_threshold_usd >= self.notifications.max_threshold_usd {
            return Err(ConfigError::Message(
                "Notification threshold floor must be below the ceiling".to_string(),
            ));
        }

        if self.enrichment.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Enrichment timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
