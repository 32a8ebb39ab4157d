//! Top-level configuration for a [`LudoCore`](crate::LudoCore).

use ludo_room::{AdmissionConfig, DEFAULT_CHANNEL_SIZE, LockConfig, RoomConfig, SweepConfig};
use serde::{Deserialize, Serialize};

use crate::LudoError;

/// Everything needed to start a core. Every section is optional in JSON;
/// missing sections take their defaults.
///
/// ```json
/// {
///   "room": { "capacity": 4, "stake": 100, "bots_enabled": true },
///   "lock": { "backend": "redis", "url": "redis://127.0.0.1/" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Defaults for new rooms.
    pub room: RoomConfig,
    pub sweep: SweepConfig,
    pub lock: LockConfig,
    pub admission: AdmissionConfig,
    /// Command queue depth of each room actor.
    pub channel_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            room: RoomConfig::default(),
            sweep: SweepConfig::default(),
            lock: LockConfig::default(),
            admission: AdmissionConfig::default(),
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }
}

impl CoreConfig {
    /// Parses a config from JSON and clamps out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, LudoError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    pub fn validated(mut self) -> Self {
        self.room = self.room.validated();
        self.sweep.interval = self.sweep.interval.validated();
        self.admission.attempts = self.admission.attempts.max(1);
        self.channel_size = self.channel_size.max(1);
        self
    }
}
