//! Unified error type for the Ludo room core.

use ludo_engine::RuleError;
use ludo_protocol::ProtocolError;
use ludo_room::{ErrorKind, RoomError};

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum LudoError {
    /// A room-level error (full, not found, not your turn, store or ledger).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A move the rules refuse.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Encoding or decoding an event failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The configuration could not be parsed.
    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl LudoError {
    /// Error category, for deciding between reject, retry and resync.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Room(err) => err.kind(),
            Self::Rule(_) | Self::Config(_) => ErrorKind::Validation,
            Self::Protocol(_) => ErrorKind::External,
        }
    }
}
