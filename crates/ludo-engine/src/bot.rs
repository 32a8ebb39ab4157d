//! Bot decision engine.
//!
//! Given a board, a color and a roll, the bot scores every legal move and
//! plays the best one. A move's score is a weighted sum of terms:
//!
//! | term | effect |
//! |---|---|
//! | immediate win | dominant bonus |
//! | WinZone progress | bonus × resulting WinZone count |
//! | capture | large bonus, more for victims close to winning |
//! | safe landing / safe stack | fixed bonuses |
//! | bring-out | bonus, boosted for short games, penalized when enough pieces are already out |
//! | progress | proportional to distance advanced |
//! | risk | penalty × chance of being captured next turn |
//! | look-ahead | minus the strongest opponent's expected best reply |
//! | escape | bonus for leaving a threatened square |
//! | tie-break | tiny bias toward lower piece indices |
//!
//! Candidates come from [`rules::legal_moves`], so the bot can only ever
//! pick a move the turn engine accepts.

use serde::{Deserialize, Serialize};

use crate::board::{self, WIN_STEP};
use crate::rules::{self, Move, MoveKind};
use crate::{Color, GameState, Position};

const WIN_BONUS: f64 = 10_000.0;
const WIN_ZONE_PROGRESS: f64 = 400.0;
const CAPTURE_BASE: f64 = 800.0;
const CAPTURE_PER_THREAT: f64 = 60.0;
const SAFE_LANDING: f64 = 120.0;
const SAFE_STACK: f64 = 60.0;
const BRING_OUT: f64 = 250.0;
const BRING_OUT_SHORT_GAME: f64 = 150.0;
const OVEREXTEND_PENALTY: f64 = 600.0;
const PROGRESS: f64 = 300.0;
const RISK: f64 = 500.0;
const ESCAPE: f64 = 900.0;
const TIE_BREAK: f64 = 0.001;

// Values of an opponent's reply in the look-ahead.
const REPLY_CAPTURE_MOVER: f64 = 1_000.0;
const REPLY_CAPTURE_OTHER: f64 = 300.0;
const REPLY_WIN_ZONE: f64 = 600.0;
const REPLY_SAFE: f64 = 150.0;
const REPLY_PROGRESS: f64 = 100.0;

/// Games won with this many pieces or fewer count as short games, where
/// getting pieces out early pays off.
const SHORT_GAME_PIECES: u8 = 2;

/// How hard a bot plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Weight of the adversarial look-ahead term. Easy bots don't look ahead.
    fn lookahead_weight(self) -> f64 {
        match self {
            Self::Easy => 0.0,
            Self::Medium => 0.35,
            Self::Hard => 0.5,
        }
    }

    /// Multiplier on reaction latency: weaker bots "think" longer.
    pub fn latency_scale(self) -> f64 {
        match self {
            Self::Easy => 1.4,
            Self::Medium => 1.0,
            Self::Hard => 0.7,
        }
    }
}

/// Game settings the bot needs to evaluate moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotSettings {
    pub required_pieces: u8,
    pub difficulty: Difficulty,
}

/// Picks the best legal move for `color` with `roll`, or `None` if there is none.
pub fn choose_move(state: &GameState, color: Color, roll: u8, settings: &BotSettings) -> Option<Move> {
    let mut best: Option<(Move, f64)> = None;
    for mv in rules::legal_moves(state, color, roll) {
        let score = score_move(state, &mv, settings);
        tracing::trace!(%color, piece = mv.piece, to = %mv.to, score, "bot candidate");
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((mv, score));
        }
    }
    best.map(|(mv, _)| mv)
}

/// Scores one legal move. Larger is better.
pub fn score_move(state: &GameState, mv: &Move, settings: &BotSettings) -> f64 {
    let color = mv.color;
    let mut after = state.clone();
    let captured = rules::apply_unchecked(&mut after, mv);

    let mut score = 0.0;

    // Finishing.
    if mv.to.is_in_win_zone() {
        let finished = after.win_zone_count(color);
        if finished >= usize::from(settings.required_pieces) {
            score += WIN_BONUS;
        } else {
            score += WIN_ZONE_PROGRESS * finished as f64;
        }
    }

    // Capturing.
    if let Some(victim) = captured {
        score += CAPTURE_BASE + CAPTURE_PER_THREAT * threat_score(state, victim.color);
    }

    // Landing somewhere safe.
    let landed_safe = match board::ring_square(mv.to, color) {
        Some(square) => board::is_safe_square(square),
        // Ducking into the home stretch takes the piece out of reach.
        None => mv.to.is_in_home_stretch() && board::ring_square(mv.from, color).is_some(),
    };
    if landed_safe {
        score += SAFE_LANDING;
        if stacks_with_own(state, mv) {
            score += SAFE_STACK;
        }
    }

    // Bringing pieces out.
    if mv.kind == MoveKind::BringOut {
        score += BRING_OUT;
        if settings.required_pieces <= SHORT_GAME_PIECES {
            score += BRING_OUT_SHORT_GAME;
        }
        if state.active_count(color) >= usize::from(settings.required_pieces) {
            score -= OVEREXTEND_PENALTY;
        }
    }

    // Plain progress.
    let advanced = board::distance_travelled(mv.to).saturating_sub(board::distance_travelled(mv.from));
    score += PROGRESS * f64::from(advanced) / f64::from(WIN_STEP);

    // Exposure at the destination.
    let risk_after = exposure(&after, color, mv.to);
    score -= RISK * risk_after;

    // What the opponents can do to us next.
    let weight = settings.difficulty.lookahead_weight();
    if weight > 0.0 {
        score -= weight * worst_reply(&after, color);
    }

    // Running away from a threat.
    let risk_before = exposure(state, color, mv.from);
    if risk_before > 0.0 && risk_after == 0.0 {
        score += ESCAPE * risk_before * (0.5 + board::progress_ratio(mv.from));
    }

    score - TIE_BREAK * mv.piece as f64
}

/// How close `color` is to winning, 0.0–10.0.
///
/// Half comes from finished pieces, half from the average progress of the
/// pieces still on the board.
pub fn threat_score(state: &GameState, color: Color) -> f64 {
    let Some(pieces) = state.pieces(color) else {
        return 0.0;
    };
    let finished = state.win_zone_count(color) as f64 / pieces.len() as f64;
    let on_track: Vec<f64> = pieces
        .iter()
        .filter(|p| p.is_on_track())
        .map(|p| board::progress_ratio(*p))
        .collect();
    let avg_progress = if on_track.is_empty() {
        0.0
    } else {
        on_track.iter().sum::<f64>() / on_track.len() as f64
    };
    (10.0 * (0.5 * finished + 0.5 * avg_progress)).clamp(0.0, 10.0)
}

/// Probability (0–1) that some opponent can capture `color`'s piece at
/// `pos` with the next roll: the share of dice faces for which at least one
/// opponent piece lands on that square. Zero on safe positions.
pub fn capture_probability(state: &GameState, color: Color, pos: Position) -> f64 {
    exposure(state, color, pos)
}

fn exposure(state: &GameState, color: Color, pos: Position) -> f64 {
    let Some(square) = board::ring_square(pos, color) else {
        return 0.0;
    };
    if board::is_safe_square(square) {
        return 0.0;
    }
    let hits = (1..=rules::SIX)
        .filter(|&face| {
            state.colors().filter(|c| *c != color).any(|opp| {
                state.pieces(opp).into_iter().flatten().any(|&p| {
                    board::next_position(p, face)
                        .and_then(|to| board::ring_square(to, opp))
                        == Some(square)
                })
            })
        })
        .count();
    hits as f64 / 6.0
}

fn stacks_with_own(state: &GameState, mv: &Move) -> bool {
    board::ring_square(mv.to, mv.color).is_some_and(|square| {
        state
            .occupants(square)
            .iter()
            .any(|(c, idx)| *c == mv.color && *idx != mv.piece)
    })
}

/// The strongest opponent's expected best reply against `mover`.
///
/// For each opponent and each face, take the single best reply; average
/// over faces; return the maximum across opponents.
fn worst_reply(after: &GameState, mover: Color) -> f64 {
    after
        .colors()
        .filter(|c| *c != mover)
        .map(|opp| {
            let total: f64 = (1..=rules::SIX)
                .map(|face| best_reply_value(after, opp, face, mover))
                .sum();
            total / 6.0
        })
        .fold(0.0, f64::max)
}

fn best_reply_value(state: &GameState, opp: Color, face: u8, mover: Color) -> f64 {
    rules::legal_moves(state, opp, face)
        .iter()
        .map(|reply| match rules::capture_target(state, opp, reply.to) {
            Some((victim, idx)) if victim == mover => {
                let lost = state
                    .position(victim, idx)
                    .map_or(0.0, board::progress_ratio);
                REPLY_CAPTURE_MOVER * (0.5 + lost)
            }
            Some(_) => REPLY_CAPTURE_OTHER,
            None if reply.to.is_in_win_zone() => REPLY_WIN_ZONE,
            None if reply.kind == MoveKind::Advance && board::is_safe(reply.to, opp) => REPLY_SAFE,
            None => {
                let advanced = board::distance_travelled(reply.to)
                    .saturating_sub(board::distance_travelled(reply.from));
                REPLY_PROGRESS * f64::from(advanced) / f64::from(WIN_STEP)
            }
        })
        .fold(0.0, f64::max)
}
