//! Transport abstraction layer for Waypoint.
//!
//! Provides the [`Transport`] and [`Connection`] traits that hide the
//! network protocol from the session layer. The session core never sees a
//! socket: it receives raw frames and hands back frames to send.
//!
//! Accepting is split in two. [`Transport::accept`] only takes the peer
//! off the listener; the protocol handshake runs later through
//! [`Handshake::upgrade`], on the peer's own task, so a slow or silent
//! peer never holds up the accept loop.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
///
/// This is the key the session registry uses to find a client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A peer taken off the listener whose handshake has not run yet.
    type Pending: Handshake<Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming peer. Does no protocol I/O.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted peer that still has to complete the protocol handshake.
pub trait Handshake: Send + 'static {
    /// The connection produced by a successful handshake.
    type Connection: Connection;
    /// The error type for the handshake.
    type Error: std::error::Error + Send + Sync;

    /// The identifier the connection will carry once upgraded.
    fn id(&self) -> ConnectionId;

    /// Runs the handshake. Callers bound it with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single duplex connection carrying discrete frames.
///
/// `send` and `recv` take `&self` and must be callable concurrently:
/// the server reads inbound frames on one task while a writer task
/// pushes outbound frames on another.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
