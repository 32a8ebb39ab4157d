//! Room lifecycle for the Ludo room core.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! players, turn and piece positions. Nothing outside the actor touches
//! that state; everything goes through a [`RoomHandle`].
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms, hands out handles, hydrates rooms
//!   from the store
//! - [`RoomHandle`]: send commands (roll, move, leave, info) to a room
//! - [`AdmissionController`]: two-phase, lock-guarded joins, bot
//!   replacement and bot naming
//! - [`EligibilitySweeper`]: periodic bot backfill and room retirement
//! - [`RoomStore`] / [`Ledger`]: collaborators the core consumes
//! - [`RoomLock`]: in-process or Redis keyed locks

#![allow(async_fn_in_trait)]

mod admission;
mod config;
mod error;
mod ledger;
pub mod lock;
pub mod model;
mod naming;
mod registry;
mod room;
mod store;
mod sweeper;

pub use admission::{AdmissionConfig, AdmissionController, BOT_ID_BASE};
pub use config::RoomConfig;
pub use error::{ErrorKind, RoomError};
pub use ledger::{Ledger, LedgerEntry, LedgerEntryKind, LedgerError, MemoryLedger};
pub use lock::{LockConfig, LockToken, RoomLock};
pub use model::{GameSettings, GameStateRecord, JoinRequest, LastRoll, Player, RoomRecord};
pub use naming::unique_bot_name;
pub use registry::{DEFAULT_CHANNEL_SIZE, RoomRegistry};
pub use room::{Admission, EventSender, RollResult, RoomHandle, RoomInfo, RoomServices, RoomSnapshot};
pub use store::{MemoryStore, RoomStore, StoreError};
pub use sweeper::{EligibilitySweeper, SweepConfig, SweepReport, SweeperHandle};
