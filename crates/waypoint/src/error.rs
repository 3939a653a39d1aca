//! Unified error type for the Waypoint server.

use std::time::Duration;

use waypoint_protocol::ProtocolError;
use waypoint_session::{SessionError, SinkError};
use waypoint_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum WaypointError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A peer connected but did not finish the WebSocket handshake in time.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (registry, stopped actor).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The movement log could not be opened.
    #[error(transparent)]
    Sink(#[from] SinkError),
}
