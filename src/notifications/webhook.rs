//! Webhook notification service
//!
//! Posts swap alerts as JSON to the room's configured URL, with per-room
//! rate limiting to keep a chatty wallet from flooding a channel.

use super::{NotificationService, SwapAlert};
use crate::config::NotificationsConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Rate limiter for notifications
struct RateLimiter {
    /// Last sent time per room code
    last_sent: RwLock<HashMap<String, Instant>>,
    /// Minimum interval between sends for one room
    interval: Duration,
}

impl RateLimiter {
    fn new(interval_seconds: u64) -> Self {
        Self {
            last_sent: RwLock::new(HashMap::new()),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Check if this room may send again
    fn can_send(&self, key: &str) -> bool {
        let last_sent = self.last_sent.read();
        match last_sent.get(key) {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Mark a room as having sent
    fn mark_sent(&self, key: &str) {
        let mut last_sent = self.last_sent.write();
        last_sent.insert(key.to_string(), Instant::now());
    }
}

/// Webhook notification service
pub struct WebhookNotifier {
    /// HTTP client
    client: reqwest::Client,
    /// Whether enabled
    enabled: bool,
    /// Rate limiter
    rate_limiter: RateLimiter,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    pub fn new(config: &NotificationsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            enabled: config.enabled,
            rate_limiter: RateLimiter::new(config.rate_limit_seconds),
        }
    }

    /// Post a message to the alert's URL
    async fn send_message(&self, url: &str, text: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "text": text,
        });

        let response = self.client.post(url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Notification webhook error: {} - {}", status, body);
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationService for WebhookNotifier {
    async fn notify(&self, alert: &SwapAlert) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if !self.rate_limiter.can_send(&alert.room_code) {
            tracing::debug!(
                room = %alert.room_code,
                "Rate limited, skipping notification"
            );
            return Ok(());
        }

        let message = alert.format_message();
        self.send_message(&alert.webhook_url, &message).await?;
        self.rate_limiter.mark_sent(&alert.room_code);

        tracing::info!(
            room = %alert.room_code,
            tx = %alert.swap.tx_hash,
            "Sent swap notification"
        );

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
