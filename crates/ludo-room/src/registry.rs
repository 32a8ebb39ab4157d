//! Room registry: creates, tracks and hydrates room actors.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ludo_protocol::RoomId;
use tokio::sync::RwLock;

use crate::model::RoomRecord;
use crate::room::{RoomServices, spawn_room};
use crate::store::StoreError;
use crate::{Ledger, RoomConfig, RoomError, RoomHandle, RoomInfo, RoomStore};

/// Default command channel size for room actors.
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Ids tried before giving up when another process keeps taking them.
const CREATE_ATTEMPTS: u32 = 8;

/// Owns one [`RoomHandle`] per live room.
///
/// The map only ever hands out handles; room state lives in the actors.
/// A room that isn't loaded here but exists in the store is hydrated on
/// first access.
pub struct RoomRegistry<S, L> {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    services: Arc<RoomServices<S, L>>,
    defaults: RoomConfig,
    channel_size: usize,
    next_id: AtomicU64,
}

impl<S: RoomStore, L: Ledger> RoomRegistry<S, L> {
    pub fn new(services: Arc<RoomServices<S, L>>, defaults: RoomConfig) -> Self {
        Self::with_channel_size(services, defaults, DEFAULT_CHANNEL_SIZE)
    }

    pub fn with_channel_size(services: Arc<RoomServices<S, L>>, defaults: RoomConfig, channel_size: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            services,
            defaults: defaults.validated(),
            channel_size: channel_size.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn services(&self) -> &Arc<RoomServices<S, L>> {
        &self.services
    }

    pub fn defaults(&self) -> &RoomConfig {
        &self.defaults
    }

    /// Creates a room with the default config.
    pub async fn create_room(&self) -> Result<RoomId, RoomError> {
        self.create_room_with(self.defaults.clone()).await
    }

    /// Creates a room, stores it and starts its actor.
    pub async fn create_room_with(&self, config: RoomConfig) -> Result<RoomId, RoomError> {
        let config = config.validated();
        for _ in 0..CREATE_ATTEMPTS {
            let room_id = RoomId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let record = RoomRecord::new(room_id, config.settings(), config.bots_enabled);
            match self.services.store.insert_room(&record).await {
                Ok(()) => {}
                Err(StoreError::AlreadyExists(_)) => continue,
                Err(err) => return Err(err.into()),
            }

            let handle = spawn_room(record, None, config.clone(), Arc::clone(&self.services), self.channel_size);
            self.rooms.write().await.insert(room_id, handle);
            tracing::info!(%room_id, capacity = config.capacity, stake = config.stake, "room created");
            return Ok(room_id);
        }
        Err(RoomError::External("could not allocate a room id".into()))
    }

    /// Returns the live handle for a room, if loaded here.
    pub async fn get(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.rooms
            .read()
            .await
            .get(&room_id)
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// Returns the handle for a room, loading it from the store if needed.
    pub async fn get_or_hydrate(&self, room_id: RoomId) -> Result<RoomHandle, RoomError> {
        if let Some(handle) = self.get(room_id).await {
            return Ok(handle);
        }

        let record = self
            .services
            .store
            .load_room(room_id)
            .await?
            .ok_or(RoomError::NotFound(room_id))?;
        let game = self
            .services
            .store
            .load_game_state(room_id)
            .await?
            .map(|g| g.pieces);

        let mut rooms = self.rooms.write().await;
        // Another task may have hydrated the room while we were reading.
        if let Some(handle) = rooms.get(&room_id).filter(|h| !h.is_closed()) {
            return Ok(handle.clone());
        }
        let config = self.defaults.clone().with_settings(&record.settings);
        let status = record.status;
        let handle = spawn_room(record, game, config, Arc::clone(&self.services), self.channel_size);
        rooms.insert(room_id, handle.clone());
        tracing::info!(%room_id, %status, "room hydrated from store");
        Ok(handle)
    }

    /// Removes a room and stops its actor. The stored record stays.
    pub async fn retire(&self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .write()
            .await
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        let _ = handle.shutdown().await;
        tracing::info!(%room_id, "room retired");
        Ok(())
    }

    /// Cloned handles to every loaded room, so callers can talk to rooms
    /// without holding the registry lock.
    pub async fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.read().await.values().cloned().collect()
    }

    /// Info for every room with a free seat. Rooms that don't answer are
    /// skipped.
    pub async fn list_open(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::new();
        for handle in self.handles().await {
            if let Ok(info) = handle.info().await {
                if info.is_open() {
                    infos.push(info);
                }
            }
        }
        infos.sort_by_key(|info| info.room_id);
        infos
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Stops every room.
    pub async fn shutdown_all(&self) {
        let handles: Vec<RoomHandle> = self.rooms.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }
}
