//! Outbound notifications
//!
//! Pushes swap alerts to room-configured webhook URLs when a swap's USD
//! value crosses the room's threshold. Delivery is fire-and-forget from the
//! room's point of view: failures are logged, never propagated back into
//! ingestion.

pub mod webhook;

pub use webhook::WebhookNotifier;

use crate::models::SwapRecord;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A threshold-crossing swap, ready to push
#[derive(Debug, Clone)]
pub struct SwapAlert {
    /// Room the swap landed in
    pub room_code: String,
    /// The swap itself, as currently known (may be pre- or post-enrichment)
    pub swap: SwapRecord,
    /// Threshold that was crossed
    pub threshold_usd: f64,
    /// Where to deliver
    pub webhook_url: String,
}

impl SwapAlert {
    /// USD value the alert fired on
    pub fn usd_value(&self) -> Option<f64> {
        self.swap.usd_value_in.or(self.swap.usd_value_out)
    }

    /// Format the alert as a notification message
    pub fn format_message(&self) -> String {
        let sold = format_leg(
            self.swap.amount_in,
            self.swap.token_in_symbol.as_deref(),
            self.swap.token_in.as_deref(),
        );
        let bought = format_leg(
            self.swap.amount_out,
            self.swap.token_out_symbol.as_deref(),
            self.swap.token_out.as_deref(),
        );
        let usd = self
            .usd_value()
            .map(|v| format!("${:.2}", v))
            .unwrap_or_else(|| "unknown value".to_string());

        format!(
            "💱 Swap alert in room {}\n{} swapped {} for {} on {}\nValue: {} (threshold ${:.2})\nTx: {}",
            self.room_code,
            short_address(&self.swap.wallet_address),
            sold,
            bought,
            self.swap.dex_name,
            usd,
            self.threshold_usd,
            self.swap.tx_hash,
        )
    }
}

/// One swap leg as "amount SYMBOL", degrading to whatever is known
fn format_leg(amount: Option<Decimal>, symbol: Option<&str>, token: Option<&str>) -> String {
    let name = symbol
        .map(str::to_string)
        .or_else(|| token.map(short_address))
        .unwrap_or_else(|| "?".to_string());
    match amount {
        Some(amount) => format!("{} {}", amount.normalize(), name),
        None => name,
    }
}

/// Abbreviate a hex address for display
fn short_address(address: &str) -> String {
    if address.len() > 12 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

/// Notification service trait
#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Send a notification
    async fn notify(&self, alert: &SwapAlert) -> anyhow::Result<()>;

    /// Check if the service is enabled
    fn is_enabled(&self) -> bool;
}

/// Composite notifier that can send to multiple services
pub struct CompositeNotifier {
    services: Vec<Arc<dyn NotificationService>>,
}

impl CompositeNotifier {
    /// Create a new composite notifier
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Add a notification service
    pub fn add_service(&mut self, service: Arc<dyn NotificationService>) {
        self.services.push(service);
    }

    /// Send notification to all enabled services
    pub async fn notify(&self, alert: &SwapAlert) {
        for service in &self.services {
            if service.is_enabled() {
                if let Err(e) = service.notify(alert).await {
                    tracing::error!(
                        error = %e,
                        room = %alert.room_code,
                        tx = %alert.swap.tx_hash,
                        "Failed to send notification"
                    );
                }
            }
        }
    }
}

impl Default for CompositeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
