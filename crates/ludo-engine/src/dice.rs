//! Dice rolls, including the optional "assisted randomness" policy.
//!
//! Humans always get a fair die. Bots can be given an assisted die that
//! periodically forces a six and sometimes picks a face that enables a
//! capture. The policy is a room setting so it can be audited or turned
//! off without touching legality or scoring.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Color, GameState, rules};

/// How bot rolls are produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DicePolicy {
    /// Uniform 1..=6 for everyone.
    #[default]
    Fair,
    /// Bot rolls are nudged toward engaging outcomes.
    Assisted {
        /// Every n-th bot roll is a six. 0 disables forcing.
        forced_six_every: u32,
        /// Probability (0.0–1.0) of choosing a capture-enabling face
        /// when one exists.
        capture_bias: f64,
    },
}

/// A room's die.
pub struct Dice {
    rng: StdRng,
    policy: DicePolicy,
    bot_rolls: u32,
}

impl Dice {
    /// Creates a die seeded from the OS.
    pub fn new(policy: DicePolicy) -> Self {
        Self::with_rng(policy, StdRng::from_os_rng())
    }

    /// Creates a reproducible die.
    pub fn seeded(policy: DicePolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: DicePolicy, rng: StdRng) -> Self {
        Self {
            rng,
            policy,
            bot_rolls: 0,
        }
    }

    /// A fair roll.
    pub fn roll(&mut self) -> u8 {
        self.rng.random_range(1..=6)
    }

    /// A roll for a bot playing `color`, subject to the room's policy.
    pub fn roll_for_bot(&mut self, state: &GameState, color: Color) -> u8 {
        let DicePolicy::Assisted {
            forced_six_every,
            capture_bias,
        } = self.policy
        else {
            return self.roll();
        };

        self.bot_rolls = self.bot_rolls.wrapping_add(1);
        if forced_six_every > 0 && self.bot_rolls % forced_six_every == 0 {
            tracing::trace!(%color, "assisted roll: forced six");
            return rules::SIX;
        }

        let bias = capture_bias.clamp(0.0, 1.0);
        if bias > 0.0 {
            if let Some(face) = capture_face(state, color) {
                if self.rng.random_bool(bias) {
                    tracing::trace!(%color, face, "assisted roll: capture face");
                    return face;
                }
            }
        }
        self.roll()
    }
}

/// The lowest face that lets `color` capture something, if any.
fn capture_face(state: &GameState, color: Color) -> Option<u8> {
    (1..=rules::SIX).find(|&face| {
        rules::legal_moves(state, color, face)
            .iter()
            .any(|mv| rules::capture_target(state, color, mv.to).is_some())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    #[test]
    fn test_fair_rolls_stay_in_range() {
        let mut dice = Dice::seeded(DicePolicy::Fair, 7);
        for _ in 0..500 {
            let v = dice.roll();
            assert!((1..=6).contains(&v));
        }
    }

    #[test]
    fn test_fair_policy_bot_roll_is_plain_roll() {
        let state = GameState::new(&[Color::Red]);
        let mut a = Dice::seeded(DicePolicy::Fair, 99);
        let mut b = Dice::seeded(DicePolicy::Fair, 99);
        for _ in 0..20 {
            assert_eq!(a.roll_for_bot(&state, Color::Red), b.roll());
        }
    }

    #[test]
    fn test_assisted_forces_periodic_six() {
        let state = GameState::new(&[Color::Red]);
        let policy = DicePolicy::Assisted {
            forced_six_every: 3,
            capture_bias: 0.0,
        };
        let mut dice = Dice::seeded(policy, 1);
        let rolls: Vec<u8> = (0..9).map(|_| dice.roll_for_bot(&state, Color::Red)).collect();
        assert_eq!(rolls[2], 6);
        assert_eq!(rolls[5], 6);
        assert_eq!(rolls[8], 6);
    }

    #[test]
    fn test_assisted_full_bias_picks_capture_face() {
        // Red step 3 (square 3) can hit yellow at square 7 with a 4.
        let state = GameState::from_pieces([
            (Color::Red, [Position::Track(3), Position::Home(1), Position::Home(2), Position::Home(3)]),
            (Color::Yellow, [Position::Track(33), Position::Home(1), Position::Home(2), Position::Home(3)]),
        ]);
        let policy = DicePolicy::Assisted {
            forced_six_every: 0,
            capture_bias: 1.0,
        };
        let mut dice = Dice::seeded(policy, 5);
        assert_eq!(dice.roll_for_bot(&state, Color::Red), 4);
    }
}
