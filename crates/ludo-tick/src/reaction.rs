//! Bot reaction latency.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How long a bot waits before acting, emulating a human's reaction time.
///
/// A delay is `(base + uniform(0..=jitter)) × scale`, where `scale` comes
/// from the bot's difficulty (weaker bots take longer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionDelay {
    pub base: Duration,
    pub jitter: Duration,
}

impl Default for ReactionDelay {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(900),
            jitter: Duration::from_millis(1_200),
        }
    }
}

impl ReactionDelay {
    /// No delay at all. Useful in tests and simulations.
    pub const INSTANT: Self = Self {
        base: Duration::ZERO,
        jitter: Duration::ZERO,
    };

    /// Draws a delay using the thread-local RNG.
    pub fn sample(&self, scale: f64) -> Duration {
        self.sample_with(&mut rand::rng(), scale)
    }

    /// Draws a delay from the given RNG.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R, scale: f64) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rng.random_range(0..=jitter_ms)
        };
        let raw = self.base + Duration::from_millis(extra);
        raw.mul_f64(scale.max(0.0))
    }

    /// Largest delay `sample` can return for the given scale.
    pub fn max(&self, scale: f64) -> Duration {
        (self.base + self.jitter).mul_f64(scale.max(0.0))
    }
}
