//! Protocol errors.

use crate::RoomId;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("could not encode event: {0}")]
    Encode(#[source] serde_json::Error),

    /// Malformed bytes, or a shape that matches no known event.
    #[cfg(feature = "json")]
    #[error("could not decode event: {0}")]
    Decode(#[source] serde_json::Error),

    /// The event decoded but belongs to another room's stream.
    #[error("event for room {found} arrived on the stream of room {expected}")]
    WrongRoom { expected: RoomId, found: RoomId },
}
