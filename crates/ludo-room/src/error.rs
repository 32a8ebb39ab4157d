//! Error types for the room layer.

use ludo_engine::RuleError;
use ludo_protocol::{PlayerId, RoomId};

use crate::ledger::LedgerError;
use crate::store::StoreError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (here or in the store).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The player is not seated in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomId),

    /// No seat is free.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// Another admission held the room's lock for too long.
    #[error("room {0} is busy, try again")]
    Conflict(RoomId),

    /// The store holds a newer version of the room than this process.
    #[error("stale record for room {0}")]
    StaleRecord(RoomId),

    /// The room is in a status that doesn't allow this operation.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),

    /// A roll or move came from someone whose turn it isn't.
    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),

    /// The rules rejected a move.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// A store, ledger or lock backend failed.
    #[error("external dependency failed: {0}")]
    External(String),

    /// The room's actor is gone (shut down or crashed).
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

/// Coarse error classes, used to decide how a caller should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-turn request. Nothing changed; tell the actor.
    Validation,
    /// Lost a race. Retry, or report the room as full.
    Conflict,
    /// Something vanished. The client should resync.
    NotFound,
    /// A collaborator failed. Critical transitions were rolled back.
    External,
}

impl RoomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState(_) | Self::NotYourTurn(_) | Self::Rule(_) => ErrorKind::Validation,
            Self::RoomFull(_) | Self::Conflict(_) | Self::StaleRecord(_) => ErrorKind::Conflict,
            Self::NotFound(_) | Self::NotInRoom(..) | Self::Unavailable(_) => ErrorKind::NotFound,
            Self::External(_) => ErrorKind::External,
        }
    }
}

impl From<LedgerError> for RoomError {
    fn from(err: LedgerError) -> Self {
        Self::External(err.to_string())
    }
}

impl From<StoreError> for RoomError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { room_id, .. } => Self::StaleRecord(room_id),
            StoreError::AlreadyExists(room_id) => Self::StaleRecord(room_id),
            StoreError::NotFound(room_id) => Self::NotFound(room_id),
            other => Self::External(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(RoomError::RoomFull(RoomId(1)).kind(), ErrorKind::Conflict);
        assert_eq!(RoomError::Rule(RuleError::NeedsSix).kind(), ErrorKind::Validation);
        assert_eq!(RoomError::Unavailable(RoomId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(RoomError::External("down".into()).kind(), ErrorKind::External);
    }

    #[test]
    fn test_store_conflict_maps_to_stale_record() {
        let err: RoomError = StoreError::VersionConflict {
            room_id: RoomId(4),
            expected: 1,
            found: 2,
        }
        .into();
        assert!(matches!(err, RoomError::StaleRecord(RoomId(4))));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
