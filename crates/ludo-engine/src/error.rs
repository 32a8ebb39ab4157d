//! Error types for the rules layer.

use crate::{Color, Position};

/// Reasons a move or roll is rejected by the rules.
///
/// Every variant is a validation failure: the state is never mutated
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// Dice values are 1 through 6.
    #[error("invalid roll {0}")]
    InvalidRoll(u8),

    /// Each color has pieces 0 through 3.
    #[error("piece index {0} is out of range")]
    PieceOutOfRange(usize),

    /// The color is not seated in this game.
    #[error("color {0} is not in play")]
    ColorNotInPlay(Color),

    /// The command was issued against an older view of the board.
    #[error("stale position: expected {expected}, piece is at {actual}")]
    StalePosition { expected: Position, actual: Position },

    /// Pieces leave Home only on a six.
    #[error("a piece leaves home only on a roll of 6")]
    NeedsSix,

    /// The roll would carry the piece past the WinZone.
    #[error("roll {0} overshoots the win zone")]
    Overshoot(u8),

    /// Pieces in the WinZone no longer move.
    #[error("piece has already finished")]
    AlreadyFinished,

    /// The destination holds an own piece on a square that doesn't allow stacking.
    #[error("destination square is blocked")]
    Blocked,
}
