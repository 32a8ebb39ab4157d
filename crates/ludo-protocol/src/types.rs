//! Identity and room metadata types.

use std::fmt;

use ludo_engine::{Color, Difficulty};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a player (human or bot).
///
/// Newtype over `u64` so a `RoomId` can't be passed where a `PlayerId`
/// is expected. Serializes as the bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a room (one game instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a room.
///
/// ```text
/// Waiting → Playing → Finished
/// ```
///
/// - **Waiting**: accepting joins, not yet at capacity.
/// - **Playing**: every seat taken; turns are being played.
/// - **Finished**: someone won. The room lingers until it is retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if the room is accepting new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// The only valid next status, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` follows the lifecycle.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerView
// ---------------------------------------------------------------------------

/// What other participants see of a seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: Color,
    pub is_bot: bool,
    /// Only meaningful for bots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&PlayerId(42)).unwrap(), "42");
        assert_eq!(PlayerId(42).to_string(), "P-42");
        assert_eq!(RoomId(3).to_string(), "R-3");
    }

    #[test]
    fn test_room_status_next_follows_strict_order() {
        assert_eq!(RoomStatus::Waiting.next(), Some(RoomStatus::Playing));
        assert_eq!(RoomStatus::Playing.next(), Some(RoomStatus::Finished));
        assert_eq!(RoomStatus::Finished.next(), None);
        assert!(!RoomStatus::Waiting.can_transition_to(RoomStatus::Finished));
        assert!(RoomStatus::Waiting.is_joinable());
        assert!(!RoomStatus::Playing.is_joinable());
    }

    #[test]
    fn test_player_view_omits_difficulty_for_humans() {
        let view = PlayerView {
            id: PlayerId(1),
            name: "ana".into(),
            color: Color::Green,
            is_bot: false,
            difficulty: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["color"], "green");
        assert!(json.get("difficulty").is_none());
    }
}
