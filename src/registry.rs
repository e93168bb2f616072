//! Room registry and swap router
//!
//! Owns the authoritative code -> room mapping and the wallet membership
//! index used to fan inbound swaps out to every room tracking the wallet.
//! There is never more than one live actor per code: creation happens
//! under the registry's write lock.

use crate::codes::{generate_code, normalize_code};
use crate::config::AppConfig;
use crate::enrichment::EnrichmentService;
use crate::error::{AppError, AppResult};
use crate::metrics::MetricsState;
use crate::models::{normalize_wallet_address, IngestOutcome, RawSwap};
use crate::notifications::CompositeNotifier;
use crate::room::{RoomActor, RoomHandle};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Attempts at drawing a free generated code before giving up
const CODE_RETRY_LIMIT: usize = 16;

/// What happened to one swap across the membership index
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteSummary {
    /// Rooms the wallet resolved to
    pub matched_rooms: usize,
    /// Rooms that accepted the swap as new
    pub ingested: usize,
    /// Rooms that had already seen this swap id
    pub duplicates: usize,
}

/// Shared handle to the room table; cheap to clone
#[derive(Clone)]
pub struct RoomRegistry {
    /// Live rooms by canonical code
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
    /// Wallet address -> codes of the rooms tracking it
    wallet_index: Arc<RwLock<HashMap<String, HashSet<String>>>>,
    config: Arc<AppConfig>,
    enricher: Arc<dyn EnrichmentService>,
    notifier: Arc<CompositeNotifier>,
    metrics: Arc<MetricsState>,
    shutdown: CancellationToken,
}

impl RoomRegistry {
    pub fn new(
        config: Arc<AppConfig>,
        enricher: Arc<dyn EnrichmentService>,
        notifier: Arc<CompositeNotifier>,
        metrics: Arc<MetricsState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            wallet_index: Arc::new(RwLock::new(HashMap::new())),
            config,
            enricher,
            notifier,
            metrics,
            shutdown,
        }
    }

    /// Create a room under a custom or freshly generated code.
    ///
    /// The write lock is held across the spawn so two concurrent requests
    /// can never end up with two actors for the same code.
    pub fn create_room(&self, custom_code: Option<String>) -> AppResult<RoomHandle> {
        let mut rooms = self.rooms.write();

        let code = match custom_code {
            Some(raw) => {
                let code = normalize_code(&raw)?;
                if rooms.contains_key(&code) {
                    return Err(AppError::Conflict(format!(
                        "Room code already in use: {}",
                        code
                    )));
                }
                code
            }
            None => {
                let mut candidate = generate_code();
                let mut attempts = 1;
                while rooms.contains_key(&candidate) {
                    if attempts >= CODE_RETRY_LIMIT {
                        return Err(AppError::Internal(
                            "Could not allocate a free room code".to_string(),
                        ));
                    }
                    candidate = generate_code();
                    attempts += 1;
                }
                candidate
            }
        };

        let handle = RoomActor::spawn(
            code.clone(),
            self.config.clone(),
            self.clone(),
            self.enricher.clone(),
            self.notifier.clone(),
            self.metrics.clone(),
            self.shutdown.child_token(),
        );
        rooms.insert(code.clone(), handle.clone());
        self.metrics.rooms_created.inc();
        tracing::info!(room = %code, "Room registered");

        Ok(handle)
    }

    /// Look up a live room by code (normalized first)
    pub fn room(&self, code: &str) -> AppResult<RoomHandle> {
        let code = normalize_code(code)?;
        self.rooms
            .read()
            .get(&code)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Room not found: {}", code)))
    }

    /// Deliver one swap to every room tracking its wallet.
    ///
    /// Handles are snapshotted under the read lock, then each mailbox is
    /// awaited with no lock held. A room that expired between snapshot and
    /// delivery is skipped.
    pub async fn route_swap(&self, mut swap: RawSwap) -> AppResult<RouteSummary> {
        if let Err(reason) = swap.validate() {
            return Err(AppError::Validation(reason));
        }
        swap.wallet_address = normalize_wallet_address(&swap.wallet_address)?;

        let codes: Vec<String> = {
            let index = self.wallet_index.read();
            match index.get(&swap.wallet_address) {
                Some(codes) => codes.iter().cloned().collect(),
                None => return Ok(RouteSummary::default()),
            }
        };
        let handles: Vec<RoomHandle> = {
            let rooms = self.rooms.read();
            codes
                .iter()
                .filter_map(|code| rooms.get(code).cloned())
                .collect()
        };

        let mut summary = RouteSummary {
            matched_rooms: handles.len(),
            ..Default::default()
        };
        for handle in handles {
            match handle.ingest_swap(swap.clone()).await {
                Ok(IngestOutcome::Ingested) => summary.ingested += 1,
                Ok(IngestOutcome::Duplicate) => summary.duplicates += 1,
                Ok(IngestOutcome::NotTracked) => {}
                Err(_) => {}
            }
        }

        Ok(summary)
    }

    /// Deregister a room and scrub its membership index entries.
    ///
    /// Called by the actor itself on expiry and on shutdown, so the guards
    /// are taken one at a time.
    pub(crate) fn remove_room(&self, code: &str) {
        self.rooms.write().remove(code);

        let mut index = self.wallet_index.write();
        index.retain(|_, codes| {
            codes.remove(code);
            !codes.is_empty()
        });
    }

    /// Record that a room tracks a wallet; the actor calls this before it
    /// confirms the add to the caller
    pub(crate) fn index_wallet(&self, address: &str, code: &str) {
        self.wallet_index
            .write()
            .entry(address.to_string())
            .or_default()
            .insert(code.to_string());
    }

    pub(crate) fn unindex_wallet(&self, address: &str, code: &str) {
        let mut index = self.wallet_index.write();
        if let Some(codes) = index.get_mut(address) {
            codes.remove(code);
            if codes.is_empty() {
                index.remove(address);
            }
        }
    }

    /// Number of live rooms, for the health endpoint
    pub fn active_rooms(&self) -> usize {
        self.rooms.read().len()
    }
}
