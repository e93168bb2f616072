//! Room actor
//!
//! Every live room is one task owning all of that room's state: tracked
//! wallets, the bounded swap log, stats, notification settings, and the
//! viewer connection pool. All interaction goes through the mailbox, so
//! state transitions within a room are strictly serialized and viewers
//! observe events in the same order the room applied them. Slow work
//! (enrichment lookups, notification posts) runs in detached tasks and
//! re-enters through the same mailbox.

mod fanout;
mod messages;

pub use fanout::ConnectionPool;
pub use messages::*;

use crate::config::AppConfig;
use crate::enrichment::EnrichmentService;
use crate::error::{AppError, AppResult};
use crate::metrics::MetricsState;
use crate::models::{
    normalize_wallet_address, validate_label, EnrichmentData, IngestOutcome, NotificationConfig,
    RawSwap, RoomSnapshot, RoomStats, SwapHistoryPage, SwapId, SwapRecord, WalletEntry,
};
use crate::notifications::{CompositeNotifier, SwapAlert};
use crate::registry::RoomRegistry;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Commands a room accepts through its mailbox
pub enum RoomCommand {
    AddWallet {
        address: String,
        label: Option<String>,
        reply: oneshot::Sender<AppResult<RoomSnapshot>>,
    },
    RemoveWallet {
        address: String,
        reply: oneshot::Sender<AppResult<RoomSnapshot>>,
    },
    ConfigureNotification {
        config: Option<NotificationConfig>,
        reply: oneshot::Sender<AppResult<()>>,
    },
    IngestSwap {
        swap: RawSwap,
        reply: oneshot::Sender<IngestOutcome>,
    },
    /// Posted back by a finished enrichment task
    ApplyEnrichment { id: SwapId, data: EnrichmentData },
    Extend {
        hours: i64,
        reply: oneshot::Sender<AppResult<DateTime<Utc>>>,
    },
    Attach {
        id: Uuid,
        sender: mpsc::Sender<Arc<String>>,
        reply: oneshot::Sender<()>,
    },
    Detach { id: Uuid },
    RequestSync { id: Uuid },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    History {
        page: usize,
        per_page: usize,
        reply: oneshot::Sender<SwapHistoryPage>,
    },
}

/// Cloneable mailbox handle for one room
#[derive(Clone, Debug)]
pub struct RoomHandle {
    code: String,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &str {
        &self.code
    }

    fn closed(&self) -> AppError {
        AppError::RoomClosed(self.code.clone())
    }

    pub async fn add_wallet(
        &self,
        address: String,
        label: Option<String>,
    ) -> AppResult<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::AddWallet { address, label, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    pub async fn remove_wallet(&self, address: String) -> AppResult<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::RemoveWallet { address, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    pub async fn configure_notification(
        &self,
        config: Option<NotificationConfig>,
    ) -> AppResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::ConfigureNotification { config, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    pub async fn ingest_swap(&self, swap: RawSwap) -> AppResult<IngestOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::IngestSwap { swap, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn extend(&self, hours: i64) -> AppResult<DateTime<Utc>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Extend { hours, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    pub async fn attach(&self, id: Uuid, sender: mpsc::Sender<Arc<String>>) -> AppResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Attach { id, sender, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Fire-and-forget: a dead room has already dropped the connection
    pub async fn detach(&self, id: Uuid) {
        let _ = self.tx.send(RoomCommand::Detach { id }).await;
    }

    pub async fn request_sync(&self, id: Uuid) {
        let _ = self.tx.send(RoomCommand::RequestSync { id }).await;
    }

    pub async fn snapshot(&self) -> AppResult<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Snapshot { reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn history(&self, page: usize, per_page: usize) -> AppResult<SwapHistoryPage> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::History { page, per_page, reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }
}

/// Single-writer task owning one room's state
pub struct RoomActor {
    code: String,
    config: Arc<AppConfig>,
    registry: RoomRegistry,
    enricher: Arc<dyn EnrichmentService>,
    notifier: Arc<CompositeNotifier>,
    metrics: Arc<MetricsState>,
    shutdown: CancellationToken,
    rx: mpsc::Receiver<RoomCommand>,
    /// Retained clone so detached tasks re-enter through the mailbox
    self_tx: mpsc::Sender<RoomCommand>,

    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    expiry_warned: bool,
    wallets: Vec<WalletEntry>,
    notification_config: Option<NotificationConfig>,
    /// Bounded swap log, newest at the front
    swaps: VecDeque<SwapRecord>,
    stats: RoomStats,
    pool: ConnectionPool,
}

impl RoomActor {
    /// Create the room and spawn its task, returning the mailbox handle
    pub(crate) fn spawn(
        code: String,
        config: Arc<AppConfig>,
        registry: RoomRegistry,
        enricher: Arc<dyn EnrichmentService>,
        notifier: Arc<CompositeNotifier>,
        metrics: Arc<MetricsState>,
        shutdown: CancellationToken,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::channel(config.rooms.mailbox_capacity);
        let now = Utc::now();

        let actor = Self {
            code: code.clone(),
            created_at: now,
            expires_at: now + Duration::hours(config.rooms.ttl_hours),
            expiry_warned: false,
            wallets: Vec::new(),
            notification_config: None,
            swaps: VecDeque::new(),
            stats: RoomStats::default(),
            pool: ConnectionPool::new(),
            rx,
            self_tx: tx.clone(),
            config,
            registry,
            enricher,
            notifier,
            metrics,
            shutdown,
        };

        tokio::spawn(actor.run());

        RoomHandle { code, tx }
    }

    /// Room event loop: mailbox commands plus the expiry timer
    async fn run(mut self) {
        tracing::info!(
            room = %self.code,
            expires_at = %self.expires_at,
            "Room opened"
        );
        self.metrics.rooms_active.inc();
        let shutdown = self.shutdown.clone();

        loop {
            let wake_at = self.next_wake();
            let sleep_for = (wake_at - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);

            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
                _ = tokio::time::sleep(sleep_for) => {
                    if Utc::now() >= self.expires_at {
                        self.expire();
                        break;
                    }
                    self.warn_expiring();
                }
                _ = shutdown.cancelled() => {
                    self.close();
                    break;
                }
            }
        }

        self.metrics.rooms_active.dec();
    }

    /// Next timer deadline: the warning point first, then expiry itself
    fn next_wake(&self) -> DateTime<Utc> {
        if self.expiry_warned {
            return self.expires_at;
        }
        let warn_at = self.expires_at - Duration::seconds(self.config.rooms.expiry_warning_secs);
        warn_at.min(self.expires_at)
    }

    fn handle_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::AddWallet { address, label, reply } => {
                let _ = reply.send(self.add_wallet(address, label));
            }
            RoomCommand::RemoveWallet { address, reply } => {
                let _ = reply.send(self.remove_wallet(address));
            }
            RoomCommand::ConfigureNotification { config, reply } => {
                let _ = reply.send(self.configure_notification(config));
            }
            RoomCommand::IngestSwap { swap, reply } => {
                let _ = reply.send(self.ingest(swap));
            }
            RoomCommand::ApplyEnrichment { id, data } => {
                self.apply_enrichment(id, data);
            }
            RoomCommand::Extend { hours, reply } => {
                let _ = reply.send(self.extend(hours));
            }
            RoomCommand::Attach { id, sender, reply } => {
                self.attach(id, sender);
                let _ = reply.send(());
            }
            RoomCommand::Detach { id } => {
                self.detach(id);
            }
            RoomCommand::RequestSync { id } => {
                self.send_room_data(id);
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::History { page, per_page, reply } => {
                let _ = reply.send(self.history(page, per_page));
            }
        }
    }

    // ========================================================================
    // Wallet list
    // ========================================================================

    fn add_wallet(&mut self, address: String, label: Option<String>) -> AppResult<RoomSnapshot> {
        let address = normalize_wallet_address(&address)?;
        if let Some(label) = label.as_deref() {
            validate_label(label, self.config.rooms.label_max_chars)?;
        }
        if self.wallets.iter().any(|w| w.address == address) {
            return Err(AppError::Conflict(format!(
                "Wallet already tracked: {}",
                address
            )));
        }
        if self.wallets.len() >= self.config.rooms.max_wallets {
            return Err(AppError::LimitExceeded(format!(
                "Room tracks at most {} wallets",
                self.config.rooms.max_wallets
            )));
        }

        let entry = WalletEntry {
            address: address.clone(),
            label,
            added_at: Utc::now(),
        };
        self.wallets.push(entry.clone());
        // Index before replying, so webhook routing sees the wallet no later
        // than the caller sees the success
        self.registry.index_wallet(&address, &self.code);

        tracing::info!(room = %self.code, wallet = %address, "Wallet added");
        self.broadcast(&ServerMessage::WalletAdded(entry));
        Ok(self.snapshot())
    }

    fn remove_wallet(&mut self, address: String) -> AppResult<RoomSnapshot> {
        let address = normalize_wallet_address(&address)?;
        let Some(position) = self.wallets.iter().position(|w| w.address == address) else {
            return Err(AppError::NotFound(format!("Wallet not tracked: {}", address)));
        };

        self.wallets.remove(position);
        self.registry.unindex_wallet(&address, &self.code);

        tracing::info!(room = %self.code, wallet = %address, "Wallet removed");
        self.broadcast(&ServerMessage::WalletRemoved(WalletRemovedData { address }));
        Ok(self.snapshot())
    }

    fn configure_notification(&mut self, config: Option<NotificationConfig>) -> AppResult<()> {
        match config {
            Some(config) => {
                config.validate(
                    self.config.notifications.min_threshold_usd,
                    self.config.notifications.max_threshold_usd,
                )?;
                tracing::info!(
                    room = %self.code,
                    threshold_usd = config.usd_threshold,
                    "Notifications configured"
                );
                self.notification_config = Some(config);
            }
            None => {
                tracing::info!(room = %self.code, "Notifications cleared");
                self.notification_config = None;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Swap ingestion
    // ========================================================================

    fn ingest(&mut self, raw: RawSwap) -> IngestOutcome {
        let id = raw.id();
        if self.swaps.iter().any(|s| s.id == id) {
            self.metrics.swaps_duplicate.inc();
            tracing::debug!(room = %self.code, swap = %id, "Duplicate swap ignored");
            return IngestOutcome::Duplicate;
        }
        if !self.wallets.iter().any(|w| w.address == raw.wallet_address) {
            return IngestOutcome::NotTracked;
        }

        // Clone for the lookup task before the raw swap is consumed
        let wants_enrichment = self.config.enrichment.enabled && raw.usd_value_in.is_none();
        let lookup = wants_enrichment.then(|| raw.clone());

        let record = SwapRecord::from_raw(raw);
        self.swaps.push_front(record.clone());
        self.swaps.truncate(self.config.rooms.swap_log_cap);
        self.stats.record(record.usd_value_in);
        self.metrics.swaps_ingested.inc();

        tracing::info!(
            room = %self.code,
            swap = %record.id,
            wallet = %record.wallet_address,
            dex = %record.dex_name,
            "Swap ingested"
        );

        self.broadcast(&ServerMessage::Swap(record.clone()));

        if self.crosses_threshold(&record) {
            self.dispatch_notification(&record);
        }
        if let Some(raw) = lookup {
            self.spawn_enrichment(raw);
        }

        IngestOutcome::Ingested
    }

    /// Detached lookup with a hard deadline; the result re-enters through
    /// the mailbox so it is serialized like any other command
    fn spawn_enrichment(&self, raw: RawSwap) {
        let enricher = self.enricher.clone();
        let self_tx = self.self_tx.clone();
        let metrics = self.metrics.clone();
        let code = self.code.clone();
        let deadline = std::time::Duration::from_millis(self.config.enrichment.timeout_ms);
        let id = raw.id();

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let result = tokio::time::timeout(deadline, enricher.enrich(&raw)).await;
            metrics
                .enrichment_latency
                .observe(started.elapsed().as_millis() as f64);

            match result {
                Ok(Ok(data)) => {
                    if data.is_empty() {
                        return;
                    }
                    // The room may have expired in the meantime
                    let _ = self_tx.send(RoomCommand::ApplyEnrichment { id, data }).await;
                }
                Ok(Err(e)) => {
                    metrics.enrichment_failures.inc();
                    tracing::debug!(room = %code, swap = %id, error = %e, "Enrichment lookup failed");
                }
                Err(_) => {
                    metrics.enrichment_failures.inc();
                    tracing::debug!(room = %code, swap = %id, "Enrichment lookup timed out");
                }
            }
        });
    }

    fn apply_enrichment(&mut self, id: SwapId, data: EnrichmentData) {
        let Some(position) = self.swaps.iter().position(|s| s.id == id) else {
            tracing::debug!(room = %self.code, swap = %id, "Enriched swap already evicted");
            return;
        };

        let old_usd;
        let was_eligible;
        {
            let record = &self.swaps[position];
            old_usd = record.usd_value_in;
            was_eligible = self.crosses_threshold(record);
        }

        if let Some(record) = self.swaps.get_mut(position) {
            record.apply_enrichment(data);
        }
        let record = self.swaps[position].clone();

        if let Some(new_usd) = record.usd_value_in {
            let delta = new_usd - old_usd.unwrap_or(0.0);
            if delta != 0.0 {
                self.stats.add_volume(delta);
            }
        }

        tracing::debug!(room = %self.code, swap = %record.id, "Enrichment applied");
        self.broadcast(&ServerMessage::SwapUpdated(record.clone()));

        // Fire only on the upward crossing: a swap that was already over
        // the threshold at ingest time has notified once
        if !was_eligible && self.crosses_threshold(&record) {
            self.dispatch_notification(&record);
        }
    }

    fn crosses_threshold(&self, record: &SwapRecord) -> bool {
        let Some(config) = &self.notification_config else {
            return false;
        };
        // Thresholds are judged on the incoming leg only
        let Some(usd) = record.usd_value_in else {
            return false;
        };
        usd >= config.usd_threshold
    }

    fn dispatch_notification(&self, record: &SwapRecord) {
        let Some(config) = &self.notification_config else {
            return;
        };
        let alert = SwapAlert {
            room_code: self.code.clone(),
            swap: record.clone(),
            threshold_usd: config.usd_threshold,
            webhook_url: config.webhook_url.clone(),
        };
        self.metrics.notifications_dispatched.inc();
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            notifier.notify(&alert).await;
        });
    }

    // ========================================================================
    // Lifetime
    // ========================================================================

    fn extend(&mut self, hours: i64) -> AppResult<DateTime<Utc>> {
        if hours < 1 {
            return Err(AppError::Validation(
                "Extension must be at least one hour".to_string(),
            ));
        }
        if hours > self.config.rooms.max_extension_hours {
            return Err(AppError::LimitExceeded(format!(
                "Extension capped at {} hours per request",
                self.config.rooms.max_extension_hours
            )));
        }

        let ceiling = self.created_at + Duration::hours(self.config.rooms.max_lifetime_hours);
        let proposed = (self.expires_at + Duration::hours(hours)).min(ceiling);
        if proposed <= self.expires_at {
            return Err(AppError::LimitExceeded(format!(
                "Room lifetime is capped at {} hours",
                self.config.rooms.max_lifetime_hours
            )));
        }

        self.expires_at = proposed;
        self.expiry_warned = false;
        tracing::info!(room = %self.code, expires_at = %self.expires_at, "Room extended");
        Ok(self.expires_at)
    }

    fn warn_expiring(&mut self) {
        self.expiry_warned = true;
        let seconds_left = (self.expires_at - Utc::now()).num_seconds().max(0);
        tracing::debug!(room = %self.code, seconds_left, "Expiry warning");
        self.broadcast(&ServerMessage::Expiring(ExpiringData {
            expires_at: self.expires_at,
            seconds_left,
        }));
    }

    fn expire(&mut self) {
        tracing::info!(
            room = %self.code,
            swaps = self.stats.swap_count,
            viewers = self.pool.count(),
            "Room expired"
        );
        let viewers = self.pool.count();
        self.pool.close_all();
        self.metrics.ws_connections.sub(viewers as i64);
        self.registry.remove_room(&self.code);
        self.metrics.rooms_expired.inc();
    }

    fn close(&mut self) {
        let viewers = self.pool.count();
        self.pool.close_all();
        self.metrics.ws_connections.sub(viewers as i64);
        self.registry.remove_room(&self.code);
        tracing::info!(room = %self.code, "Room closed for shutdown");
    }

    // ========================================================================
    // Viewers
    // ========================================================================

    fn attach(&mut self, id: Uuid, sender: mpsc::Sender<Arc<String>>) {
        self.pool.track(id, sender);
        self.metrics.ws_connections.inc();
        tracing::debug!(
            room = %self.code,
            connection = %id,
            viewers = self.pool.count(),
            "Viewer attached"
        );
        self.send_room_data(id);
        self.broadcast_presence();
    }

    fn detach(&mut self, id: Uuid) {
        if self.pool.untrack(&id) {
            self.metrics.ws_connections.dec();
            tracing::debug!(
                room = %self.code,
                connection = %id,
                viewers = self.pool.count(),
                "Viewer detached"
            );
            self.broadcast_presence();
        }
    }

    fn send_room_data(&mut self, id: Uuid) {
        let payload = self.room_data_payload();
        let before = self.pool.count();
        self.pool.send(&id, &ServerMessage::RoomData(payload));
        self.settle_pool(before);
    }

    fn room_data_payload(&self) -> RoomDataPayload {
        RoomDataPayload {
            room: self.snapshot(),
            recent_swaps: self
                .swaps
                .iter()
                .take(self.config.rooms.replay_swaps)
                .cloned()
                .collect(),
        }
    }

    /// Broadcast and, when delivery failures shrank the pool, follow with a
    /// presence correction
    fn broadcast(&mut self, message: &ServerMessage) -> usize {
        let before = self.pool.count();
        let delivered = self.pool.broadcast(message);
        if self.settle_pool(before) > 0 {
            self.broadcast_presence();
        }
        delivered
    }

    fn broadcast_presence(&mut self) {
        let before = self.pool.count();
        let message = ServerMessage::Presence(PresenceData { viewers: before });
        self.pool.broadcast(&message);
        // No recursive correction: viewers dropped here show up in the next
        // presence event
        self.settle_pool(before);
    }

    /// Reconcile metrics after pool operations; returns how many were dropped
    fn settle_pool(&mut self, before: usize) -> usize {
        let dropped = before.saturating_sub(self.pool.count());
        if dropped > 0 {
            self.metrics.ws_connections.sub(dropped as i64);
            self.metrics.broadcast_dropped.inc_by(dropped as u64);
        }
        dropped
    }

    // ========================================================================
    // Views
    // ========================================================================

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            wallets: self.wallets.clone(),
            stats: self.stats,
            notifications_enabled: self.notification_config.is_some(),
            viewer_count: self.pool.count(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    fn history(&self, page: usize, per_page: usize) -> SwapHistoryPage {
        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);
        let start = page.saturating_sub(1).saturating_mul(per_page);

        SwapHistoryPage {
            swaps: self.swaps.iter().skip(start).take(per_page).cloned().collect(),
            page,
            per_page,
            total: self.swaps.len(),
        }
    }
}
