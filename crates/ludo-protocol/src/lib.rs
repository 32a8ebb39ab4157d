//! Wire-level types for the Ludo room core.
//!
//! This crate defines what leaves a room:
//!
//! - **Types** ([`PlayerId`], [`RoomId`], [`RoomStatus`], [`PlayerView`]):
//!   identities and room metadata shared by every layer.
//! - **Events** ([`GameEvent`], [`RoomEvent`], [`Recipient`]): the
//!   lifecycle and turn notifications a presentation layer renders.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Room actor (GameEvent) → RoomEvent { room, recipient, seq } → Codec → bytes
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{GameEvent, Recipient, RoomEvent};
pub use types::{PlayerId, PlayerView, RoomId, RoomStatus};
