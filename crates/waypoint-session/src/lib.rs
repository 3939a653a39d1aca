//! Per-connection sessions for Waypoint.
//!
//! This crate is the server's authority on where every client is:
//!
//! 1. **Position engine**: [`position::apply`] maps a position and a
//!    command to the next position
//! 2. **Session actor**: [`spawn_session`] runs one task per client that
//!    owns its position and its active [`Game`]
//! 3. **Registry**: [`SessionRegistry`] maps live connections to sessions
//! 4. **Movement log**: [`MovementSink`] receives one record per accepted
//!    move, written off the response path by [`spawn_sink_writer`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← accepts connections, pumps frames in and out
//!     ↕
//! Session Layer (this crate)  ← game state, timers, movement log
//!     ↕
//! Protocol Layer (below)  ← frames, positions, identifiers
//! ```

mod config;
mod error;
mod game;
pub mod position;
mod registry;
mod session;
mod sink;

pub use config::SessionConfig;
pub use error::{SessionError, SinkError};
pub use game::{unix_millis, Game, GameSummary};
pub use registry::SessionRegistry;
pub use session::{
    generate_session_id, spawn_session, OutboundReceiver, SessionHandle,
    SessionSnapshot,
};
pub use sink::{
    spawn_sink_writer, JsonLinesSink, LogSink, MovementRecord, MovementSink,
    SinkHandle,
};
