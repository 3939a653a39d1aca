//! # Waypoint
//!
//! A server-authoritative position tracker. Clients connect over
//! WebSocket and send `{"command": "up" | "down" | "left" | "right"}`;
//! the server owns each client's position, groups consecutive moves
//! into games that close after a period of inactivity, and reports the
//! straight-line distance of each finished game.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use waypoint::prelude::*;
//!
//! # async fn run() -> Result<(), WaypointError> {
//! let server = ServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(LogSink)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::WaypointError;
pub use server::{Server, ServerBuilder};

pub mod prelude {
    pub use crate::{Server, ServerBuilder, WaypointError};
    pub use waypoint_protocol::{
        ClientMessage, Codec, Direction, GameId, JsonCodec, Position,
        ServerMessage, SessionId,
    };
    pub use waypoint_session::{
        JsonLinesSink, LogSink, MovementRecord, MovementSink, SessionConfig,
        SessionError, SessionRegistry, SinkError,
    };
    pub use waypoint_transport::{ConnectionId, TransportError};
}
