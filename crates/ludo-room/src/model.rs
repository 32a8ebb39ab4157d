//! Persisted room records.
//!
//! A [`RoomRecord`] is what a [`RoomStore`](crate::RoomStore) keeps for a
//! room: enough to hydrate an actor in another process. Piece positions
//! live in a separate [`GameStateRecord`] since they change on every move.

use std::time::{SystemTime, UNIX_EPOCH};

use ludo_engine::{Color, Difficulty, GameState};
use ludo_protocol::{PlayerId, PlayerView, RoomId, RoomStatus};
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A seated participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: Color,
    pub is_bot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Unix millis.
    pub joined_at: u64,
}

impl Player {
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            color: self.color,
            is_bot: self.is_bot,
            difficulty: self.difficulty,
        }
    }
}

/// Who asks for a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub player_id: PlayerId,
    /// Bots without a name get a unique one from the room.
    pub name: Option<String>,
    /// `Some` for bots.
    pub bot: Option<Difficulty>,
}

impl JoinRequest {
    pub fn human(player_id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            player_id,
            name: Some(name.into()),
            bot: None,
        }
    }

    pub fn bot(player_id: PlayerId, difficulty: Difficulty) -> Self {
        Self {
            player_id,
            name: None,
            bot: Some(difficulty),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.bot.is_some()
    }
}

/// The most recent roll in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRoll {
    pub value: u8,
    pub roller: PlayerId,
    /// `true` once the roll has been consumed by a move or a pass.
    pub moved: bool,
}

/// Settings fixed at room creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub capacity: usize,
    pub required_pieces: u8,
    pub stake: u64,
}

/// The persisted shape of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: RoomId,
    /// In join order, which is also turn order.
    pub players: Vec<Player>,
    pub current_turn: Option<PlayerId>,
    pub status: RoomStatus,
    pub last_roll: Option<LastRoll>,
    pub settings: GameSettings,
    pub bots_enabled: bool,
    /// Unix millis.
    pub created_at: u64,
    /// Rolls made so far. Zero means the first roll hasn't happened.
    pub turn_number: u64,
    /// Bumped on every successful write; used for conditional updates.
    pub version: u64,
}

impl RoomRecord {
    pub fn new(room_id: RoomId, settings: GameSettings, bots_enabled: bool) -> Self {
        Self {
            room_id,
            players: Vec::new(),
            current_turn: None,
            status: RoomStatus::Waiting,
            last_roll: None,
            settings,
            bots_enabled,
            created_at: now_millis(),
            turn_number: 0,
            version: 0,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.settings.capacity
    }

    pub fn bot_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_bot).count()
    }

    /// Bots may be replaced by humans until the first roll.
    pub fn has_replaceable_bot(&self) -> bool {
        self.status == RoomStatus::Playing && self.turn_number == 0 && self.bot_count() > 0
    }

    /// Index of the most recently joined bot.
    pub fn newest_bot(&self) -> Option<usize> {
        self.players
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_bot)
            .max_by_key(|(idx, p)| (p.joined_at, *idx))
            .map(|(idx, _)| idx)
    }

    /// First color of the seating order not taken yet.
    pub fn free_color(&self) -> Option<Color> {
        Color::seating(self.settings.capacity)
            .iter()
            .copied()
            .find(|c| self.players.iter().all(|p| p.color != *c))
    }

    /// A roll is outstanding and the roller still has to move.
    pub fn awaiting_move(&self) -> bool {
        matches!(
            (self.last_roll, self.current_turn),
            (Some(roll), Some(current)) if !roll.moved && roll.roller == current
        )
    }
}

/// Piece positions for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateRecord {
    pub room_id: RoomId,
    pub pieces: GameState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(capacity: usize) -> GameSettings {
        GameSettings {
            capacity,
            required_pieces: 4,
            stake: 0,
        }
    }

    fn player(id: u64, color: Color, is_bot: bool, joined_at: u64) -> Player {
        Player {
            id: PlayerId(id),
            name: format!("p{id}"),
            color,
            is_bot,
            difficulty: is_bot.then_some(Difficulty::Medium),
            joined_at,
        }
    }

    #[test]
    fn test_free_color_follows_seating() {
        let mut record = RoomRecord::new(RoomId(1), settings(2), true);
        assert_eq!(record.free_color(), Some(Color::Red));
        record.players.push(player(1, Color::Red, false, 1));
        assert_eq!(record.free_color(), Some(Color::Yellow));
        record.players.push(player(2, Color::Yellow, false, 2));
        assert_eq!(record.free_color(), None);
        assert!(record.is_full());
    }

    #[test]
    fn test_newest_bot_breaks_ties_by_seat() {
        let mut record = RoomRecord::new(RoomId(1), settings(4), true);
        record.players.push(player(1, Color::Red, false, 10));
        record.players.push(player(2, Color::Green, true, 20));
        record.players.push(player(3, Color::Yellow, true, 20));
        record.players.push(player(4, Color::Blue, false, 30));
        assert_eq!(record.newest_bot(), Some(2));
    }

    #[test]
    fn test_awaiting_move_requires_unconsumed_roll_by_current() {
        let mut record = RoomRecord::new(RoomId(1), settings(2), true);
        record.current_turn = Some(PlayerId(1));
        assert!(!record.awaiting_move());
        record.last_roll = Some(LastRoll {
            value: 3,
            roller: PlayerId(1),
            moved: false,
        });
        assert!(record.awaiting_move());
        record.current_turn = Some(PlayerId(2));
        assert!(!record.awaiting_move());
    }

    #[test]
    fn test_record_json_shape() {
        let record = RoomRecord::new(RoomId(9), settings(3), false);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["room_id"], 9);
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["settings"]["capacity"], 3);
    }
}
