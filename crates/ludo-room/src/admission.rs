//! Admission controller: the only way into a room.
//!
//! Admission runs in two phases:
//!
//! 1. **Eligibility**: a cheap check against the room's live info (the
//!    room is hydrated from the store if it isn't loaded). Most doomed
//!    joins stop here without touching the lock.
//! 2. **Commit**: under the room's `admission:<room>` lock, the join is
//!    sent to the actor, which re-checks capacity and appends the player.
//!    The lock is released on every path once the actor has answered.
//!
//! Phase 2 is what keeps concurrent joins from overfilling a room even
//! when several processes share one store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ludo_protocol::{PlayerId, RoomId, RoomStatus};
use serde::{Deserialize, Serialize};

use crate::lock::admission_key;
use crate::model::JoinRequest;
use crate::{Admission, Ledger, RoomError, RoomHandle, RoomInfo, RoomRegistry, RoomStore};

/// Bot ids are allocated from this value upward so they never collide
/// with human ids handed out by an account system.
pub const BOT_ID_BASE: u64 = 1 << 62;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Lifetime of the admission lock. Covers a crashed holder.
    pub lock_ttl: Duration,
    /// Tries to take a busy lock before reporting a conflict.
    pub attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(5),
            attempts: 20,
            retry_backoff: Duration::from_millis(25),
        }
    }
}

pub struct AdmissionController<S, L> {
    registry: Arc<RoomRegistry<S, L>>,
    config: AdmissionConfig,
    next_bot_id: AtomicU64,
}

impl<S: RoomStore, L: Ledger> AdmissionController<S, L> {
    pub fn new(registry: Arc<RoomRegistry<S, L>>, config: AdmissionConfig) -> Self {
        Self {
            registry,
            config,
            next_bot_id: AtomicU64::new(BOT_ID_BASE),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry<S, L>> {
        &self.registry
    }

    /// Seats a human. Re-joining with the same id returns the existing
    /// seat. If the room has started but nobody has rolled yet, the human
    /// takes over the newest bot's seat.
    pub async fn admit_human(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        name: impl Into<String>,
    ) -> Result<Admission, RoomError> {
        let request = JoinRequest::human(player_id, name);
        self.admit(room_id, false, |_| request).await
    }

    /// Seats a new bot with a unique name and the room's bot difficulty.
    pub async fn admit_bot(&self, room_id: RoomId) -> Result<Admission, RoomError> {
        self.admit(room_id, true, |info| {
            let player_id = PlayerId(self.next_bot_id.fetch_add(1, Ordering::Relaxed));
            JoinRequest::bot(player_id, info.bot_difficulty)
        })
        .await
    }

    /// Seats a human in the first open room, or in a new one.
    pub async fn join_or_create(
        &self,
        player_id: PlayerId,
        name: impl Into<String>,
    ) -> Result<Admission, RoomError> {
        let name = name.into();
        for info in self.registry.list_open().await {
            match self.admit_human(info.room_id, player_id, name.clone()).await {
                Ok(admission) => return Ok(admission),
                // Filled (or busy) between listing and joining; keep looking.
                Err(RoomError::RoomFull(_) | RoomError::Conflict(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        let room_id = self.registry.create_room().await?;
        self.admit_human(room_id, player_id, name).await
    }

    async fn admit(
        &self,
        room_id: RoomId,
        is_bot: bool,
        request: impl FnOnce(&RoomInfo) -> JoinRequest,
    ) -> Result<Admission, RoomError> {
        let handle = self.registry.get_or_hydrate(room_id).await?;
        let info = handle.info().await?;
        let request = request(&info);

        if info.players.contains(&request.player_id) {
            // Already seated: the actor answers idempotently, no lock needed.
            return handle.join(request).await;
        }
        if !info.admits(is_bot) {
            tracing::debug!(%room_id, player_id = %request.player_id, status = %info.status, "admission refused");
            return Err(match info.status {
                RoomStatus::Finished => RoomError::InvalidState(format!("room {room_id} has finished")),
                RoomStatus::Waiting | RoomStatus::Playing => RoomError::RoomFull(room_id),
            });
        }

        self.commit(&handle, request).await
    }

    async fn commit(&self, handle: &RoomHandle, request: JoinRequest) -> Result<Admission, RoomError> {
        let room_id = handle.room_id();
        let lock = &self.registry.services().lock;
        let key = admission_key(room_id);

        let token = lock
            .acquire_with_retry(&key, self.config.lock_ttl, self.config.attempts, self.config.retry_backoff)
            .await?;
        let Some(token) = token else {
            tracing::warn!(%room_id, player_id = %request.player_id, "admission lock contended, giving up");
            return Err(RoomError::Conflict(room_id));
        };

        let result = handle.join(request).await;

        match lock.release(&token).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(%room_id, "admission lock expired before release"),
            Err(err) => tracing::warn!(%room_id, error = %err, "failed to release admission lock"),
        }
        result
    }
}
