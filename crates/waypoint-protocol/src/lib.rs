//! Wire protocol for Waypoint.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Position`],
//!   [`Direction`], [`SessionId`], [`GameId`]): the frames and the
//!   values they carry.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session (game state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, Direction, GameId, Position, ServerMessage, SessionId,
};
