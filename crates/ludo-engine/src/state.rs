//! Per-room piece positions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::{self, PIECES_PER_COLOR};
use crate::{Color, Position};

/// Positions of every seated color's four pieces.
///
/// A `GameState` belongs to exactly one room. Colors that are not seated
/// simply have no entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameState {
    pieces: BTreeMap<Color, [Position; PIECES_PER_COLOR]>,
}

impl GameState {
    /// Creates a state with every piece of every given color at Home.
    pub fn new(colors: &[Color]) -> Self {
        let mut state = Self::default();
        for &color in colors {
            state.seat(color);
        }
        state
    }

    /// Builds a state from explicit positions. Handy for setting up
    /// mid-game positions.
    pub fn from_pieces(
        pieces: impl IntoIterator<Item = (Color, [Position; PIECES_PER_COLOR])>,
    ) -> Self {
        Self {
            pieces: pieces.into_iter().collect(),
        }
    }

    /// Adds a color with all pieces at Home. No-op if already seated.
    pub fn seat(&mut self, color: Color) {
        self.pieces
            .entry(color)
            .or_insert([0, 1, 2, 3].map(Position::Home));
    }

    /// Removes a color and all its pieces from play.
    pub fn unseat(&mut self, color: Color) {
        self.pieces.remove(&color);
    }

    /// Seated colors, in seating order.
    pub fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.pieces.keys().copied()
    }

    pub fn contains(&self, color: Color) -> bool {
        self.pieces.contains_key(&color)
    }

    pub fn pieces(&self, color: Color) -> Option<&[Position; PIECES_PER_COLOR]> {
        self.pieces.get(&color)
    }

    pub fn position(&self, color: Color, piece: usize) -> Option<Position> {
        self.pieces.get(&color).and_then(|p| p.get(piece)).copied()
    }

    pub(crate) fn set(&mut self, color: Color, piece: usize, pos: Position) {
        if let Some(slot) = self
            .pieces
            .get_mut(&color)
            .and_then(|p| p.get_mut(piece))
        {
            *slot = pos;
        }
    }

    /// Number of `color`'s pieces in the WinZone.
    pub fn win_zone_count(&self, color: Color) -> usize {
        self.count(color, Position::is_in_win_zone)
    }

    /// Number of `color`'s pieces on the board (ring or home stretch).
    pub fn active_count(&self, color: Color) -> usize {
        self.count(color, Position::is_on_track)
    }

    fn count(&self, color: Color, pred: impl Fn(Position) -> bool) -> usize {
        self.pieces
            .get(&color)
            .map_or(0, |p| p.iter().filter(|pos| pred(**pos)).count())
    }

    /// Every piece sitting on the given absolute ring square.
    pub fn occupants(&self, square: u8) -> Vec<(Color, usize)> {
        let mut found = Vec::new();
        for (&color, pieces) in &self.pieces {
            for (idx, &pos) in pieces.iter().enumerate() {
                if board::ring_square(pos, color) == Some(square) {
                    found.push((color, idx));
                }
            }
        }
        found
    }

    /// The lowest Home slot of `color` not taken by one of its pieces.
    pub fn free_home_slot(&self, color: Color) -> u8 {
        let taken: Vec<u8> = self
            .pieces
            .get(&color)
            .into_iter()
            .flatten()
            .filter_map(|pos| match pos {
                Position::Home(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        (0u8..PIECES_PER_COLOR as u8)
            .find(|slot| !taken.contains(slot))
            .unwrap_or(0)
    }
}
