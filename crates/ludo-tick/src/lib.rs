//! Timing for the Ludo room core.
//!
//! Two kinds of timers drive a room server besides player input:
//!
//! - [`IntervalScheduler`]: a fixed-period heartbeat for recurring
//!   maintenance, used by the eligibility sweeper.
//! - [`ReactionDelay`]: the jittered "thinking time" before a bot acts,
//!   scaled by the bot's difficulty.
//!
//! # Integration
//!
//! The scheduler is meant to sit inside a `tokio::select!` loop next to a
//! shutdown signal:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         _ = scheduler.wait_for_tick() => {
//!             sweep_once().await;
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod interval;
mod reaction;

pub use interval::{IntervalConfig, IntervalScheduler, TickInfo, TickMetrics, TickPolicy};
pub use reaction::ReactionDelay;
