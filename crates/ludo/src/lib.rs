//! # Ludo
//!
//! Server-authoritative room core for multiplayer Ludo.
//!
//! The core owns turn order, dice, piece movement, captures and win
//! detection. It fills empty seats with bots, lets a human take a bot's
//! seat before the first roll, and keeps concurrent joins from
//! overfilling a room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ludo::prelude::*;
//!
//! # async fn run() -> Result<(), LudoError> {
//! let (core, mut events) = LudoCore::builder().start().await?;
//! let room_id = core.create_room().await?;
//! core.join(room_id, PlayerId(1), "ana").await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event.event);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod service;

pub use config::CoreConfig;
pub use service::{LudoCore, LudoCoreBuilder};
pub use error::LudoError;

pub use ludo_engine as engine;
pub use ludo_protocol as protocol;
pub use ludo_room as room;
pub use ludo_tick as tick;

/// Installs a `tracing` subscriber that logs to stderr, filtered by
/// `RUST_LOG` (default: `info` for the ludo crates).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,ludo=info,ludo_room=info,ludo_engine=info,ludo_tick=info")
    });
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

pub mod prelude {
    pub use crate::{CoreConfig, LudoCore, LudoCoreBuilder, LudoError, init_tracing};
    pub use ludo_engine::{
        BotSettings, Color, Dice, DicePolicy, Difficulty, GameState, Move, MoveOutcome, Position, RuleError,
    };
    pub use ludo_protocol::{
        Codec, GameEvent, JsonCodec, PlayerId, PlayerView, ProtocolError, Recipient, RoomEvent, RoomId, RoomStatus,
    };
    pub use ludo_room::{
        Admission, AdmissionConfig, ErrorKind, Ledger, LockConfig, MemoryLedger, MemoryStore, RollResult, RoomConfig,
        RoomError, RoomInfo, RoomSnapshot, RoomStore, SweepConfig, SweepReport,
    };
    pub use ludo_tick::{IntervalConfig, ReactionDelay};
}
