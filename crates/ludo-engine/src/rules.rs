//! Move legality, move application and turn resolution.
//!
//! A turn goes through these states:
//!
//! ```text
//! Idle ─roll→ Rolled ─┬─(no legal move)──────────────→ TurnEnds
//!                     └─(move chosen)→ Applied ─┬────→ RepeatTurn
//!                                               └────→ TurnEnds
//! ```
//!
//! The functions here cover everything after "Rolled". Who is allowed to
//! roll, and when, is tracked by the room actor.

use serde::{Deserialize, Serialize};

use crate::board::{self, PIECES_PER_COLOR};
use crate::{Color, GameState, Position, RuleError};

/// The only roll that brings a piece out of Home (and grants a repeat turn).
pub const SIX: u8 = 6;

/// Whether a move brings a piece out or advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    BringOut,
    Advance,
}

/// A single legal move for one piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub color: Color,
    pub piece: usize,
    pub from: Position,
    pub to: Position,
    pub kind: MoveKind,
}

/// An opposing piece sent back Home by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub color: Color,
    pub piece: usize,
    /// Where the victim was standing.
    pub from: Position,
    /// Where the victim was sent.
    pub to: Position,
}

/// Everything that happened when a move was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub mv: Move,
    pub captured: Option<Capture>,
    /// The moved piece entered the WinZone.
    pub finished: bool,
    /// The mover now meets the win condition.
    pub won: bool,
}

fn check_roll(roll: u8) -> Result<(), RuleError> {
    if (1..=SIX).contains(&roll) {
        Ok(())
    } else {
        Err(RuleError::InvalidRoll(roll))
    }
}

/// Computes the move `piece` of `color` would make with `roll`, or why it can't.
pub fn candidate_move(
    state: &GameState,
    color: Color,
    piece: usize,
    roll: u8,
) -> Result<Move, RuleError> {
    check_roll(roll)?;
    if piece >= PIECES_PER_COLOR {
        return Err(RuleError::PieceOutOfRange(piece));
    }
    let from = state
        .position(color, piece)
        .ok_or(RuleError::ColorNotInPlay(color))?;

    let (to, kind) = match from {
        Position::WinZone => return Err(RuleError::AlreadyFinished),
        Position::Home(_) if roll != SIX => return Err(RuleError::NeedsSix),
        Position::Home(_) => (Position::Track(0), MoveKind::BringOut),
        Position::Track(_) => (
            board::next_position(from, roll).ok_or(RuleError::Overshoot(roll))?,
            MoveKind::Advance,
        ),
    };

    if let Some(square) = board::ring_square(to, color) {
        let occupants = state.occupants(square);
        let own_there = occupants.iter().any(|(c, _)| *c == color);
        let safe = board::is_safe_square(square);
        // Own pieces stack only on safe squares.
        if own_there && !safe {
            return Err(RuleError::Blocked);
        }
        // Two or more opposing pieces on an open square would break the
        // "one color per open square" invariant if we captured just one.
        if !safe && occupants.iter().filter(|(c, _)| *c != color).count() > 1 {
            return Err(RuleError::Blocked);
        }
    }

    Ok(Move {
        color,
        piece,
        from,
        to,
        kind,
    })
}

/// Every legal move `color` can make with `roll`, in piece order.
///
/// Two pieces at Home produce two distinct bring-out moves; callers that
/// want to de-duplicate can compare `to`.
pub fn legal_moves(state: &GameState, color: Color, roll: u8) -> Vec<Move> {
    (0..PIECES_PER_COLOR)
        .filter_map(|piece| candidate_move(state, color, piece, roll).ok())
        .collect()
}

/// The opposing piece that would be captured by a piece of `color`
/// landing on `to`, if any.
///
/// Safe squares never produce a capture.
pub fn capture_target(state: &GameState, color: Color, to: Position) -> Option<(Color, usize)> {
    let square = board::ring_square(to, color)?;
    if board::is_safe_square(square) {
        return None;
    }
    let opponents: Vec<(Color, usize)> = state
        .occupants(square)
        .into_iter()
        .filter(|(c, _)| *c != color)
        .collect();
    match opponents.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

/// Applies an already-validated move. Returns the capture, if any.
///
/// Used directly by the bot engine when simulating hypothetical states.
pub(crate) fn apply_unchecked(state: &mut GameState, mv: &Move) -> Option<Capture> {
    let captured = capture_target(state, mv.color, mv.to).map(|(victim, piece)| {
        let from = state
            .position(victim, piece)
            .unwrap_or(Position::Home(0));
        let to = Position::Home(state.free_home_slot(victim));
        state.set(victim, piece, to);
        Capture {
            color: victim,
            piece,
            from,
            to,
        }
    });
    state.set(mv.color, mv.piece, mv.to);
    captured
}

/// Validates and applies a move.
///
/// `expected_from` is the position the caller believed the piece was at
/// when it issued the command. If the authoritative position differs, the
/// command is stale and rejected. On any error the state is untouched.
pub fn apply_move(
    state: &mut GameState,
    color: Color,
    piece: usize,
    expected_from: Position,
    roll: u8,
    required_pieces: u8,
) -> Result<MoveOutcome, RuleError> {
    if piece >= PIECES_PER_COLOR {
        return Err(RuleError::PieceOutOfRange(piece));
    }
    let actual = state
        .position(color, piece)
        .ok_or(RuleError::ColorNotInPlay(color))?;
    if actual != expected_from {
        return Err(RuleError::StalePosition {
            expected: expected_from,
            actual,
        });
    }

    let mv = candidate_move(state, color, piece, roll)?;
    let captured = apply_unchecked(state, &mv);
    let finished = mv.to.is_in_win_zone();
    let won = board::has_won(state, color, required_pieces);

    tracing::trace!(%color, piece, from = %mv.from, to = %mv.to, ?captured, "move applied");

    Ok(MoveOutcome {
        mv,
        captured,
        finished,
        won,
    })
}

// ---------------------------------------------------------------------------
// Turn resolution
// ---------------------------------------------------------------------------

/// How a turn ended, as far as turn order is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The roll had no legal move.
    NoMove { roll: u8 },
    /// A move was applied.
    Moved {
        roll: u8,
        captured: bool,
        reached_win_zone: bool,
        won: bool,
    },
    /// The player left the game (or was removed) during their turn.
    Forfeit,
}

impl From<&MoveOutcome> for TurnOutcome {
    fn from(outcome: &MoveOutcome) -> Self {
        let roll = match outcome.mv.kind {
            MoveKind::BringOut => SIX,
            MoveKind::Advance => {
                board::distance_travelled(outcome.mv.to) - board::distance_travelled(outcome.mv.from)
            }
        };
        Self::Moved {
            roll,
            captured: outcome.captured.is_some(),
            reached_win_zone: outcome.finished,
            won: outcome.won,
        }
    }
}

/// Who acts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnResolution<P> {
    /// The same player rolls again.
    Repeat(P),
    /// The turn passes to this player.
    Pass(P),
    /// The given player won; the game is over.
    GameOver(P),
}

/// Resolves turn order after a turn completes.
///
/// The single place turn advancement is decided. The player repeats on a
/// six, a capture or a piece entering the WinZone; a win ends the game;
/// everything else passes to the next player in join order.
///
/// `order` is the join order including `current`. If `current` has
/// already been removed from `order`, the turn goes to the first player.
pub fn resolve_turn<P: Copy + Eq>(order: &[P], current: P, outcome: TurnOutcome) -> TurnResolution<P> {
    match outcome {
        TurnOutcome::Moved { won: true, .. } => return TurnResolution::GameOver(current),
        TurnOutcome::Moved {
            roll,
            captured,
            reached_win_zone,
            ..
        } if roll == SIX || captured || reached_win_zone => return TurnResolution::Repeat(current),
        _ => {}
    }

    let next = match order.iter().position(|p| *p == current) {
        Some(idx) => order[(idx + 1) % order.len()],
        None => order.first().copied().unwrap_or(current),
    };
    TurnResolution::Pass(next)
}
