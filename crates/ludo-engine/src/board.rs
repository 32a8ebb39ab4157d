//! Board path resolver: color-aware coordinate math.
//!
//! The board is a 52-square shared ring. Each color enters the ring at its
//! own offset, travels 51 squares around it, then turns into a private
//! 6-square home stretch that ends in the WinZone.
//!
//! Positions are stored *relative to the owning color's entry square*, so
//! `Track(0)` is always "just brought out" no matter the color. That keeps
//! [`next_position`] independent of color: the color only matters when we
//! need to know which shared square a piece physically sits on
//! ([`ring_square`]), which is what captures and safety are decided by.
//!
//! ```text
//! relative step:  0 ........ 50 | 51 ... 56 | 57
//!                 shared ring   | stretch   | WinZone
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GameState;

/// Number of squares on the shared ring.
pub const RING_SQUARES: u8 = 52;

/// Last relative step that is still on the shared ring.
pub const LAST_RING_STEP: u8 = 50;

/// Length of each color's private home stretch.
pub const HOME_STRETCH_LEN: u8 = 6;

/// Relative step count from the entry square to the WinZone.
pub const WIN_STEP: u8 = LAST_RING_STEP + HOME_STRETCH_LEN + 1;

/// Pieces per color.
pub const PIECES_PER_COLOR: usize = 4;

/// Fixed "star" squares on the ring where captures are not allowed.
pub const STAR_SQUARES: [u8; 4] = [8, 21, 34, 47];

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// One of the four seats on the board.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
}

impl Color {
    /// All colors in clockwise seating order.
    pub const ALL: [Color; 4] = [Color::Red, Color::Green, Color::Yellow, Color::Blue];

    /// The absolute ring square where this color's pieces enter the board.
    pub fn entry_square(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Green => 13,
            Self::Yellow => 26,
            Self::Blue => 39,
        }
    }

    /// Colors handed out, in join order, for a room of the given capacity.
    ///
    /// Two-player rooms sit on opposite corners so neither player starts
    /// right behind the other.
    pub fn seating(capacity: usize) -> &'static [Color] {
        match capacity {
            0 | 1 => &[Color::Red],
            2 => &[Color::Red, Color::Yellow],
            3 => &[Color::Red, Color::Green, Color::Yellow],
            _ => &Self::ALL,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
            Self::Yellow => write!(f, "yellow"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Where a single piece is.
///
/// This is the only encoding of a piece's location anywhere in the
/// workspace: there is no numeric "home" sentinel.
///
/// - `Home(slot)`: in the color's yard, in one of four slots.
/// - `Track(step)`: on the board, `step` squares past the entry square.
///   Steps `0..=50` are on the shared ring, `51..=56` are the private
///   home stretch.
/// - `WinZone`: finished. Counts toward the win condition and never moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Position {
    Home(u8),
    Track(u8),
    WinZone,
}

impl Position {
    pub fn is_home(self) -> bool {
        matches!(self, Self::Home(_))
    }

    pub fn is_on_track(self) -> bool {
        matches!(self, Self::Track(_))
    }

    pub fn is_in_win_zone(self) -> bool {
        matches!(self, Self::WinZone)
    }

    /// `true` for the private lane between the ring and the WinZone.
    pub fn is_in_home_stretch(self) -> bool {
        matches!(self, Self::Track(step) if step > LAST_RING_STEP)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home(slot) => write!(f, "home[{slot}]"),
            Self::Track(step) => write!(f, "track[{step}]"),
            Self::WinZone => write!(f, "win-zone"),
        }
    }
}

// ---------------------------------------------------------------------------
// Path math
// ---------------------------------------------------------------------------

/// Advances a piece on the board by `steps`.
///
/// Returns `None` when there is no such move:
/// - the piece is at Home (bring-out is a rules decision, not path math),
/// - the piece is already in the WinZone,
/// - `steps` is zero,
/// - the move would overshoot the WinZone (exact landing required).
///
/// Pure and deterministic; never returns an out-of-range position.
pub fn next_position(pos: Position, steps: u8) -> Option<Position> {
    let Position::Track(step) = pos else {
        return None;
    };
    if steps == 0 {
        return None;
    }
    let target = step.checked_add(steps)?;
    match target.cmp(&WIN_STEP) {
        std::cmp::Ordering::Less => Some(Position::Track(target)),
        std::cmp::Ordering::Equal => Some(Position::WinZone),
        std::cmp::Ordering::Greater => None,
    }
}

/// The absolute ring square a piece of `color` occupies, if it's on the ring.
///
/// Home, home stretch and WinZone positions are not on the shared ring
/// and return `None`.
pub fn ring_square(pos: Position, color: Color) -> Option<u8> {
    match pos {
        Position::Track(step) if step <= LAST_RING_STEP => {
            Some((color.entry_square() + step) % RING_SQUARES)
        }
        _ => None,
    }
}

/// `true` for star squares and every color's entry square.
pub fn is_safe_square(square: u8) -> bool {
    STAR_SQUARES.contains(&square) || Color::ALL.iter().any(|c| c.entry_square() == square)
}

/// `true` if a piece of `color` at `pos` cannot be captured.
///
/// Anything off the shared ring is unreachable for opponents and
/// therefore safe.
pub fn is_safe(pos: Position, color: Color) -> bool {
    ring_square(pos, color).is_none_or(is_safe_square)
}

/// `true` iff `color` has at least `required_pieces` pieces in the WinZone.
pub fn has_won(state: &GameState, color: Color, required_pieces: u8) -> bool {
    state.win_zone_count(color) >= usize::from(required_pieces)
}

/// Steps travelled from the entry square (0 at Home, [`WIN_STEP`] when finished).
pub fn distance_travelled(pos: Position) -> u8 {
    match pos {
        Position::Home(_) => 0,
        Position::Track(step) => step,
        Position::WinZone => WIN_STEP,
    }
}

/// Steps still needed to reach the WinZone. `None` while at Home.
pub fn distance_to_win(pos: Position) -> Option<u8> {
    match pos {
        Position::Home(_) => None,
        other => Some(WIN_STEP - distance_travelled(other)),
    }
}

/// Fraction of the full path already covered, in `0.0..=1.0`.
pub fn progress_ratio(pos: Position) -> f64 {
    f64::from(distance_travelled(pos)) / f64::from(WIN_STEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_position_from_home_is_none() {
        assert_eq!(next_position(Position::Home(0), 6), None);
    }

    #[test]
    fn test_next_position_advances_along_ring() {
        assert_eq!(next_position(Position::Track(0), 4), Some(Position::Track(4)));
        assert_eq!(next_position(Position::Track(48), 3), Some(Position::Track(51)));
    }

    #[test]
    fn test_next_position_exact_landing_reaches_win_zone() {
        assert_eq!(next_position(Position::Track(51), 6), Some(Position::WinZone));
        assert_eq!(next_position(Position::Track(56), 1), Some(Position::WinZone));
    }

    #[test]
    fn test_next_position_overshoot_is_none() {
        assert_eq!(next_position(Position::Track(53), 5), None);
        assert_eq!(next_position(Position::Track(56), 2), None);
    }

    #[test]
    fn test_next_position_never_out_of_range() {
        for step in 0..WIN_STEP {
            for roll in 1..=6 {
                match next_position(Position::Track(step), roll) {
                    Some(Position::Track(s)) => assert!(s < WIN_STEP),
                    Some(Position::WinZone) => assert_eq!(step + roll, WIN_STEP),
                    Some(Position::Home(_)) => panic!("path math never sends a piece home"),
                    None => assert!(step + roll > WIN_STEP),
                }
            }
        }
    }

    #[test]
    fn test_next_position_is_deterministic() {
        for step in 0..WIN_STEP {
            for roll in 0..=6 {
                let pos = Position::Track(step);
                assert_eq!(next_position(pos, roll), next_position(pos, roll));
            }
        }
    }

    #[test]
    fn test_next_position_from_win_zone_is_none() {
        assert_eq!(next_position(Position::WinZone, 1), None);
    }

    #[test]
    fn test_ring_square_wraps_around() {
        assert_eq!(ring_square(Position::Track(0), Color::Blue), Some(39));
        assert_eq!(ring_square(Position::Track(13), Color::Blue), Some(0));
        assert_eq!(ring_square(Position::Track(50), Color::Green), Some(11));
        assert_eq!(ring_square(Position::Track(51), Color::Red), None);
    }

    #[test]
    fn test_is_safe_square_stars_and_entries() {
        for sq in [0, 8, 13, 21, 26, 34, 39, 47] {
            assert!(is_safe_square(sq), "square {sq} should be safe");
        }
        for sq in [1, 7, 12, 25, 51] {
            assert!(!is_safe_square(sq), "square {sq} should not be safe");
        }
    }

    #[test]
    fn test_is_safe_off_ring_positions() {
        assert!(is_safe(Position::Home(2), Color::Red));
        assert!(is_safe(Position::Track(53), Color::Red));
        assert!(is_safe(Position::WinZone, Color::Red));
        assert!(!is_safe(Position::Track(3), Color::Red));
        // Red's step 13 is green's entry square.
        assert!(is_safe(Position::Track(13), Color::Red));
    }

    #[test]
    fn test_distance_helpers() {
        assert_eq!(distance_to_win(Position::Home(0)), None);
        assert_eq!(distance_to_win(Position::Track(51)), Some(6));
        assert_eq!(distance_to_win(Position::WinZone), Some(0));
        assert_eq!(progress_ratio(Position::WinZone), 1.0);
        assert_eq!(progress_ratio(Position::Home(1)), 0.0);
    }

    #[test]
    fn test_has_won_matches_win_zone_count_and_is_monotonic() {
        for finished in 0..=PIECES_PER_COLOR {
            let mut pieces = [Position::Track(10); PIECES_PER_COLOR];
            for piece in pieces.iter_mut().take(finished) {
                *piece = Position::WinZone;
            }
            let state = GameState::from_pieces([(Color::Red, pieces)]);

            for k in 1..=PIECES_PER_COLOR as u8 {
                let won = has_won(&state, Color::Red, k);
                assert_eq!(won, finished >= usize::from(k), "finished={finished} k={k}");
                if !won && k < PIECES_PER_COLOR as u8 {
                    assert!(!has_won(&state, Color::Red, k + 1));
                }
            }
        }
    }

    #[test]
    fn test_seating_by_capacity() {
        assert_eq!(Color::seating(2), &[Color::Red, Color::Yellow]);
        assert_eq!(Color::seating(4).len(), 4);
    }

    #[test]
    fn test_position_serializes_as_tagged_union() {
        let json = serde_json::to_string(&Position::Track(12)).unwrap();
        assert_eq!(json, r#"{"kind":"track","at":12}"#);
        let json = serde_json::to_string(&Position::WinZone).unwrap();
        assert_eq!(json, r#"{"kind":"win_zone"}"#);
    }
}
