//! Room persistence.
//!
//! The store is a mirror of actor state: rooms are authoritative in memory
//! and write through to a [`RoomStore`] so another process can hydrate
//! them. Writes are conditional on the record version, so a process with
//! a stale copy can never clobber a newer one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ludo_engine::GameState;
use ludo_protocol::RoomId;
use tokio::sync::Mutex;

use crate::model::{GameStateRecord, RoomRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    #[error("room {0} not found in store")]
    NotFound(RoomId),

    #[error("room {room_id}: expected version {expected}, found {found}")]
    VersionConflict {
        room_id: RoomId,
        expected: u64,
        found: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for rooms and piece positions.
pub trait RoomStore: Send + Sync + 'static {
    fn load_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Option<RoomRecord>, StoreError>> + Send;

    /// Stores a brand-new room. Fails if the id is taken.
    fn insert_room(
        &self,
        record: &RoomRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replaces a room if its stored version is still `expected_version`.
    fn update_room(
        &self,
        record: &RoomRecord,
        expected_version: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn save_game_state(
        &self,
        room_id: RoomId,
        pieces: &GameState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_game_state(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Option<GameStateRecord>, StoreError>> + Send;
}

/// In-process store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: Mutex<HashMap<RoomId, RoomRecord>>,
    games: Mutex<HashMap<RoomId, GameState>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with [`StoreError::Unavailable`] until reset.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn room_count(&self) -> usize {
        self.inner.rooms.lock().await.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store set to fail".into()))
        } else {
            Ok(())
        }
    }
}

impl RoomStore for MemoryStore {
    async fn load_room(&self, room_id: RoomId) -> Result<Option<RoomRecord>, StoreError> {
        self.check()?;
        Ok(self.inner.rooms.lock().await.get(&room_id).cloned())
    }

    async fn insert_room(&self, record: &RoomRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut rooms = self.inner.rooms.lock().await;
        if rooms.contains_key(&record.room_id) {
            return Err(StoreError::AlreadyExists(record.room_id));
        }
        rooms.insert(record.room_id, record.clone());
        Ok(())
    }

    async fn update_room(&self, record: &RoomRecord, expected_version: u64) -> Result<(), StoreError> {
        self.check()?;
        let mut rooms = self.inner.rooms.lock().await;
        let stored = rooms
            .get_mut(&record.room_id)
            .ok_or(StoreError::NotFound(record.room_id))?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                room_id: record.room_id,
                expected: expected_version,
                found: stored.version,
            });
        }
        *stored = record.clone();
        Ok(())
    }

    async fn save_game_state(&self, room_id: RoomId, pieces: &GameState) -> Result<(), StoreError> {
        self.check()?;
        self.inner.games.lock().await.insert(room_id, pieces.clone());
        Ok(())
    }

    async fn load_game_state(&self, room_id: RoomId) -> Result<Option<GameStateRecord>, StoreError> {
        self.check()?;
        Ok(self
            .inner
            .games
            .lock()
            .await
            .get(&room_id)
            .map(|pieces| GameStateRecord {
                room_id,
                pieces: pieces.clone(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GameSettings;

    fn record(id: u64) -> RoomRecord {
        RoomRecord::new(
            RoomId(id),
            GameSettings {
                capacity: 2,
                required_pieces: 4,
                stake: 0,
            },
            true,
        )
    }

    #[tokio::test]
    async fn test_insert_then_load() {
        let store = MemoryStore::new();
        store.insert_room(&record(1)).await.unwrap();
        let loaded = store.load_room(RoomId(1)).await.unwrap().unwrap();
        assert_eq!(loaded.room_id, RoomId(1));
        assert!(store.load_room(RoomId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_fails() {
        let store = MemoryStore::new();
        store.insert_room(&record(1)).await.unwrap();
        let err = store.insert_room(&record(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(RoomId(1))));
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let store = MemoryStore::new();
        let mut rec = record(1);
        store.insert_room(&rec).await.unwrap();

        rec.version = 1;
        store.update_room(&rec, 0).await.unwrap();

        // A second writer still holding version 0 loses.
        let err = store.update_room(&rec, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { found: 1, .. }));
    }

    #[tokio::test]
    async fn test_failing_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.load_room(RoomId(1)).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_failing(false);
        assert!(store.load_room(RoomId(1)).await.is_ok());
    }
}
