//! Codec trait and implementations for serializing events.
//!
//! The room core doesn't care how events are put on the wire. The
//! presentation layer picks a [`Codec`]; [`JsonCodec`] is the default.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ProtocolError, RoomEvent, RoomId};

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` so one codec can be shared by every task that
/// forwards room events.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Decodes a [`RoomEvent`] read from `room_id`'s stream.
    fn decode_event(&self, room_id: RoomId, data: &[u8]) -> Result<RoomEvent, ProtocolError> {
        let event: RoomEvent = self.decode(data)?;
        if event.room_id != room_id {
            return Err(ProtocolError::WrongRoom {
                expected: room_id,
                found: event.room_id,
            });
        }
        Ok(event)
    }
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use ludo_protocol::{Codec, GameEvent, JsonCodec, PlayerId, Recipient, RoomEvent, RoomId};
///
/// let codec = JsonCodec;
/// let event = RoomEvent {
///     room_id: RoomId(7),
///     seq: 3,
///     recipient: Recipient::All,
///     event: GameEvent::DiceRolled { player_id: PlayerId(1), value: 6 },
/// };
/// let bytes = codec.encode(&event).unwrap();
/// let decoded: RoomEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, event);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{GameEvent, PlayerId, Recipient, RoomEvent, RoomId, RoomStatus};

    #[test]
    fn test_json_codec_decode_garbage_fails() {
        let result: Result<RoomEvent, _> = JsonCodec.decode(b"not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_event_rejects_other_room() {
        let event = RoomEvent {
            room_id: RoomId(4),
            seq: 1,
            recipient: Recipient::Player(PlayerId(2)),
            event: GameEvent::DiceRolled {
                player_id: PlayerId(2),
                value: 3,
            },
        };
        let bytes = JsonCodec.encode(&event).unwrap();
        assert_eq!(JsonCodec.decode_event(RoomId(4), &bytes).unwrap(), event);
        assert!(matches!(
            JsonCodec.decode_event(RoomId(5), &bytes),
            Err(ProtocolError::WrongRoom {
                expected: RoomId(5),
                found: RoomId(4)
            })
        ));
    }

    #[test]
    fn test_json_codec_room_updated_shape() {
        let event = RoomEvent {
            room_id: RoomId(2),
            seq: 1,
            recipient: Recipient::All,
            event: GameEvent::RoomUpdated {
                status: RoomStatus::Playing,
                current_turn: Some(PlayerId(9)),
            },
        };
        let bytes = JsonCodec.encode(&event).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["event"]["type"], "room_updated");
        assert_eq!(json["event"]["status"], "playing");
        assert_eq!(json["event"]["current_turn"], 9);
    }
}
