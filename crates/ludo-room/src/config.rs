//! Room configuration.

use std::time::Duration;

use ludo_engine::{DicePolicy, Difficulty};
use ludo_tick::ReactionDelay;
use serde::{Deserialize, Serialize};

use crate::model::GameSettings;

/// Settings for one room.
///
/// A registry is created with a default `RoomConfig`; individual rooms can
/// be created with their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Seats in the room (2–4). The game starts when every seat is taken.
    pub capacity: usize,

    /// Pieces a color must bring into the WinZone to win (1–4).
    pub required_pieces: u8,

    /// Stake deducted from every human when the game starts.
    pub stake: u64,

    /// House cut taken from the winnings, in percent (0–100).
    pub cut_percentage: u8,

    /// Whether the sweeper may fill empty seats with bots.
    pub bots_enabled: bool,

    /// Difficulty of backfilled bots.
    pub bot_difficulty: Difficulty,

    /// How long a waiting room sits before bots are sent in.
    pub bot_join_delay: Duration,

    /// Bot "thinking time" before each roll.
    pub bot_reaction: ReactionDelay,

    /// How bot dice are rolled.
    pub dice: DicePolicy,

    /// Seeds the room's die for reproducible games. `None` seeds from the OS.
    pub dice_seed: Option<u64>,

    /// How long a finished room lingers before it is retired.
    pub idle_retire: Duration,

    /// A human who does not finish their turn within this long forfeits,
    /// as if they had left. `None` waits for them indefinitely.
    pub turn_timeout: Option<Duration>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            required_pieces: 4,
            stake: 0,
            cut_percentage: 10,
            bots_enabled: true,
            bot_difficulty: Difficulty::Medium,
            bot_join_delay: Duration::from_secs(15),
            bot_reaction: ReactionDelay::default(),
            dice: DicePolicy::Fair,
            dice_seed: None,
            idle_retire: Duration::from_secs(120),
            turn_timeout: None,
        }
    }
}

impl RoomConfig {
    pub const MIN_CAPACITY: usize = 2;
    pub const MAX_CAPACITY: usize = 4;
    pub const MIN_TURN_TIMEOUT: Duration = Duration::from_secs(1);

    /// Clamps out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        let capacity = self.capacity.clamp(Self::MIN_CAPACITY, Self::MAX_CAPACITY);
        if capacity != self.capacity {
            tracing::warn!(requested = self.capacity, capacity, "room capacity clamped");
            self.capacity = capacity;
        }
        self.required_pieces = self.required_pieces.clamp(1, 4);
        self.cut_percentage = self.cut_percentage.min(100);
        if let Some(timeout) = self.turn_timeout {
            self.turn_timeout = Some(timeout.max(Self::MIN_TURN_TIMEOUT));
        }
        self
    }

    /// Amount paid to a human winner: `2 × stake × (1 − cut/100)`.
    pub fn winnings(&self) -> u64 {
        2 * self.stake * u64::from(100 - self.cut_percentage.min(100)) / 100
    }

    /// The persisted subset of this config.
    pub fn settings(&self) -> GameSettings {
        GameSettings {
            capacity: self.capacity,
            required_pieces: self.required_pieces,
            stake: self.stake,
        }
    }

    /// This config with the persisted settings laid over it.
    pub fn with_settings(mut self, settings: &GameSettings) -> Self {
        self.capacity = settings.capacity;
        self.required_pieces = settings.required_pieces;
        self.stake = settings.stake;
        self.validated()
    }

    /// Lifetime of a "pending bot join" marker.
    pub fn backfill_marker_ttl(&self) -> Duration {
        (self.bot_join_delay * 2).max(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.required_pieces, 4);
        assert!(config.bots_enabled);
        assert_eq!(config.dice, DicePolicy::Fair);
    }

    #[test]
    fn test_validated_clamps_ranges() {
        let config = RoomConfig {
            capacity: 9,
            required_pieces: 0,
            cut_percentage: 250,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.required_pieces, 1);
        assert_eq!(config.cut_percentage, 100);

        let config = RoomConfig {
            turn_timeout: Some(Duration::from_millis(10)),
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.turn_timeout, Some(RoomConfig::MIN_TURN_TIMEOUT));
    }

    #[test]
    fn test_winnings_applies_cut() {
        let config = RoomConfig {
            stake: 50,
            cut_percentage: 10,
            ..RoomConfig::default()
        };
        assert_eq!(config.winnings(), 90);

        let free = RoomConfig {
            stake: 0,
            ..RoomConfig::default()
        };
        assert_eq!(free.winnings(), 0);
    }

    #[test]
    fn test_backfill_marker_ttl_is_twice_join_delay() {
        let config = RoomConfig {
            bot_join_delay: Duration::from_secs(10),
            ..RoomConfig::default()
        };
        assert_eq!(config.backfill_marker_ttl(), Duration::from_secs(20));
    }
}
