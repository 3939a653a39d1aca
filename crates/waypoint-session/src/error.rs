//! Error types for the session layer.

use waypoint_protocol::SessionId;
use waypoint_transport::ConnectionId;

/// Errors that can occur while driving a session.
///
/// The first two are client mistakes: they are answered with an `error`
/// frame and leave the session untouched. The rest are server-side
/// bookkeeping failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The frame was not JSON, had no `command`, or `command` was not a
    /// string.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// `command` was a string but not one of `up`, `down`, `left`, `right`.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A session is already registered for this connection.
    #[error("connection {0} already has a session")]
    AlreadyRegistered(ConnectionId),

    /// No session is registered for this connection.
    #[error("no session for connection {0}")]
    NotFound(ConnectionId),

    /// The session's actor has stopped and can't take commands.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}

/// Errors raised by a [`MovementSink`](crate::MovementSink).
///
/// None of these ever reach a client: the sink writer logs them and
/// moves on to the next record.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing to the underlying store failed.
    #[error("sink i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The record could not be serialized.
    #[error("sink encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
