//! `LudoCore` builder and service facade.
//!
//! Ties the layers together: store and ledger collaborators, the lock
//! backend, the room registry, the admission controller and the
//! eligibility sweeper.

use std::sync::Arc;

use ludo_engine::{MoveOutcome, Position};
use ludo_protocol::{PlayerId, RoomEvent, RoomId};
use ludo_room::{
    Admission, AdmissionController, EligibilitySweeper, Ledger, MemoryLedger, MemoryStore, RollResult, RoomConfig,
    RoomHandle, RoomInfo, RoomLock, RoomRegistry, RoomServices, RoomSnapshot, RoomStore, SweeperHandle,
};
use tokio::sync::mpsc;

use crate::{CoreConfig, LudoError};

/// Builder for a [`LudoCore`].
///
/// Defaults to [`MemoryStore`] and [`MemoryLedger`]; swap them for real
/// collaborators with [`store`](Self::store) and [`ledger`](Self::ledger).
///
/// ```rust,ignore
/// let (core, mut events) = LudoCore::builder()
///     .config(CoreConfig::from_json(&raw)?)
///     .store(my_store)
///     .ledger(my_ledger)
///     .start()
///     .await?;
/// ```
pub struct LudoCoreBuilder<S, L> {
    config: CoreConfig,
    store: S,
    ledger: L,
    sweeper: bool,
}

impl LudoCoreBuilder<MemoryStore, MemoryLedger> {
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
            store: MemoryStore::new(),
            ledger: MemoryLedger::new(),
            sweeper: true,
        }
    }
}

impl Default for LudoCoreBuilder<MemoryStore, MemoryLedger> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RoomStore, L: Ledger> LudoCoreBuilder<S, L> {
    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store<S2: RoomStore>(self, store: S2) -> LudoCoreBuilder<S2, L> {
        LudoCoreBuilder {
            config: self.config,
            store,
            ledger: self.ledger,
            sweeper: self.sweeper,
        }
    }

    pub fn ledger<L2: Ledger>(self, ledger: L2) -> LudoCoreBuilder<S, L2> {
        LudoCoreBuilder {
            config: self.config,
            store: self.store,
            ledger,
            sweeper: self.sweeper,
        }
    }

    /// Don't run the background sweeper. Callers drive
    /// [`EligibilitySweeper::sweep_once`] themselves.
    pub fn without_sweeper(mut self) -> Self {
        self.sweeper = false;
        self
    }

    /// Connects the lock backend, starts the sweeper and returns the core
    /// together with the receiving end of the room event stream.
    pub async fn start(self) -> Result<(LudoCore<S, L>, mpsc::UnboundedReceiver<RoomEvent>), LudoError> {
        let config = self.config.validated();
        let lock = RoomLock::connect(&config.lock).await?;

        let (services, events) = RoomServices::new(self.store, self.ledger, lock);
        let registry = Arc::new(RoomRegistry::with_channel_size(
            Arc::new(services),
            config.room.clone(),
            config.channel_size,
        ));
        let admission = Arc::new(AdmissionController::new(Arc::clone(&registry), config.admission.clone()));
        let sweeper = Arc::new(EligibilitySweeper::new(Arc::clone(&admission), config.sweep.clone()));
        let running = self.sweeper.then(|| Arc::clone(&sweeper).spawn());

        tracing::info!(
            capacity = config.room.capacity,
            stake = config.room.stake,
            bots = config.room.bots_enabled,
            sweeper = running.is_some(),
            "ludo core started"
        );

        let core = LudoCore {
            registry,
            admission,
            sweeper,
            running,
        };
        Ok((core, events))
    }
}

/// A running room core.
///
/// All room operations go through here. Rooms that exist in the store but
/// aren't loaded in this process are hydrated on first use.
pub struct LudoCore<S, L> {
    registry: Arc<RoomRegistry<S, L>>,
    admission: Arc<AdmissionController<S, L>>,
    sweeper: Arc<EligibilitySweeper<S, L>>,
    running: Option<SweeperHandle>,
}

impl LudoCore<MemoryStore, MemoryLedger> {
    pub fn builder() -> LudoCoreBuilder<MemoryStore, MemoryLedger> {
        LudoCoreBuilder::new()
    }
}

impl<S: RoomStore, L: Ledger> LudoCore<S, L> {
    pub fn registry(&self) -> &Arc<RoomRegistry<S, L>> {
        &self.registry
    }

    pub fn admission(&self) -> &Arc<AdmissionController<S, L>> {
        &self.admission
    }

    pub fn sweeper(&self) -> &Arc<EligibilitySweeper<S, L>> {
        &self.sweeper
    }

    pub async fn create_room(&self) -> Result<RoomId, LudoError> {
        Ok(self.registry.create_room().await?)
    }

    pub async fn create_room_with(&self, config: RoomConfig) -> Result<RoomId, LudoError> {
        Ok(self.registry.create_room_with(config).await?)
    }

    pub async fn join(&self, room_id: RoomId, player_id: PlayerId, name: impl Into<String>) -> Result<Admission, LudoError> {
        Ok(self.admission.admit_human(room_id, player_id, name).await?)
    }

    /// Seats a bot right away, without waiting for the sweeper.
    pub async fn add_bot(&self, room_id: RoomId) -> Result<Admission, LudoError> {
        Ok(self.admission.admit_bot(room_id).await?)
    }

    pub async fn join_or_create(&self, player_id: PlayerId, name: impl Into<String>) -> Result<Admission, LudoError> {
        Ok(self.admission.join_or_create(player_id, name).await?)
    }

    pub async fn leave(&self, room_id: RoomId, player_id: PlayerId) -> Result<(), LudoError> {
        Ok(self.room(room_id).await?.leave(player_id).await?)
    }

    pub async fn roll(&self, room_id: RoomId, player_id: PlayerId) -> Result<RollResult, LudoError> {
        Ok(self.room(room_id).await?.roll(player_id).await?)
    }

    pub async fn move_piece(
        &self,
        room_id: RoomId,
        player_id: PlayerId,
        piece: usize,
        expected_from: Position,
    ) -> Result<MoveOutcome, LudoError> {
        Ok(self.room(room_id).await?.move_piece(player_id, piece, expected_from).await?)
    }

    pub async fn info(&self, room_id: RoomId) -> Result<RoomInfo, LudoError> {
        Ok(self.room(room_id).await?.info().await?)
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<RoomSnapshot, LudoError> {
        Ok(self.room(room_id).await?.snapshot().await?)
    }

    /// Open rooms, lowest id first.
    pub async fn list_open(&self) -> Vec<RoomInfo> {
        self.registry.list_open().await
    }

    async fn room(&self, room_id: RoomId) -> Result<RoomHandle, LudoError> {
        Ok(self.registry.get_or_hydrate(room_id).await?)
    }

    /// Stops the sweeper, then every room.
    pub async fn shutdown(self) {
        if let Some(running) = self.running {
            running.stop().await;
        }
        self.registry.shutdown_all().await;
        tracing::info!("ludo core stopped");
    }
}
