//! Game rules for the Ludo room core.
//!
//! Everything in this crate is synchronous and free of I/O. A room actor
//! (in `ludo-room`) owns one [`GameState`] and calls into these modules to
//! validate and apply moves; the bot engine calls the very same rules to
//! enumerate its candidates, so a bot can never pick a move the turn
//! engine would reject.
//!
//! # Layers
//!
//! ```text
//! bot     ← scores candidate moves (heuristics + look-ahead)
//!  ↕
//! rules   ← legal moves, captures, turn resolution
//!  ↕
//! board   ← pure coordinate math (next position, safe squares, win test)
//! ```
//!
//! [`dice`] sits beside the stack: it produces roll values and is the only
//! place where the optional "assisted randomness" policy lives.

pub mod board;
pub mod bot;
pub mod dice;
mod error;
pub mod rules;
mod state;

pub use board::{Color, Position};
pub use bot::{BotSettings, Difficulty};
pub use dice::{Dice, DicePolicy};
pub use error::RuleError;
pub use rules::{Capture, Move, MoveKind, MoveOutcome, TurnOutcome, TurnResolution};
pub use state::GameState;
