//! Events a room emits for the presentation layer.
//!
//! Each event carries the minimal delta needed to re-render. A full
//! snapshot is only sent when the game ends.

use ludo_engine::{Color, GameState, Position};
use serde::{Deserialize, Serialize};

use crate::{PlayerId, PlayerView, RoomId, RoomStatus};

/// Who should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", content = "player", rename_all = "snake_case")]
pub enum Recipient {
    /// Every player in the room.
    All,
    /// Only this player (e.g. a rejection notice).
    Player(PlayerId),
}

impl Recipient {
    /// Returns `true` if `player` should receive an event addressed this way.
    pub fn includes(self, player: PlayerId) -> bool {
        match self {
            Self::All => true,
            Self::Player(p) => p == player,
        }
    }
}

/// A game or lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    PlayerJoined {
        player: PlayerView,
    },
    PlayerLeft {
        player_id: PlayerId,
        /// Set when a human took over a bot's seat.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaced_by: Option<PlayerId>,
    },
    DiceRolled {
        player_id: PlayerId,
        value: u8,
    },
    PieceMoved {
        player_id: PlayerId,
        color: Color,
        piece: usize,
        from: Position,
        to: Position,
    },
    PieceCaptured {
        by: PlayerId,
        color: Color,
        piece: usize,
        from: Position,
        to: Position,
    },
    PieceFinished {
        player_id: PlayerId,
        color: Color,
        piece: usize,
        finished: usize,
    },
    /// Turn or status change.
    RoomUpdated {
        status: RoomStatus,
        current_turn: Option<PlayerId>,
    },
    GameOver {
        winner: PlayerId,
        losers: Vec<PlayerId>,
        pieces: GameState,
    },
    /// A roll or move from this player was refused; nothing changed.
    MoveRejected {
        player_id: PlayerId,
        reason: String,
    },
}

/// An event addressed from a room, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub room_id: RoomId,
    /// Per-room sequence number, starting at 1. Gaps mean lost events and
    /// a client should resync.
    pub seq: u64,
    pub recipient: Recipient,
    pub event: GameEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_includes() {
        let p1 = PlayerId(1);
        let p2 = PlayerId(2);
        assert!(Recipient::All.includes(p1));
        assert!(Recipient::Player(p1).includes(p1));
        assert!(!Recipient::Player(p1).includes(p2));
    }

    #[test]
    fn test_game_event_internally_tagged() {
        let event = GameEvent::PieceMoved {
            player_id: PlayerId(4),
            color: Color::Blue,
            piece: 2,
            from: Position::Home(2),
            to: Position::Track(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "piece_moved");
        assert_eq!(json["color"], "blue");
        assert_eq!(json["to"]["kind"], "track");
    }

    #[test]
    fn test_game_over_carries_snapshot() {
        let pieces = GameState::new(&[Color::Red, Color::Yellow]);
        let event = GameEvent::GameOver {
            winner: PlayerId(1),
            losers: vec![PlayerId(2)],
            pieces: pieces.clone(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
