//! Per-connection handler: handshake, session setup and frame pumping.
//!
//! Each accepted peer gets its own Tokio task running this handler.
//! The flow is:
//!   1. Complete the WebSocket handshake within the configured timeout
//!   2. Spawn the session actor and register it (it greets the client
//!      with `initialState`)
//!   3. Spawn a writer that encodes the session's outbound frames
//!   4. Loop: forward each inbound frame to the session
//!   5. On close or error: unregister and stop the session

use std::sync::Arc;

use waypoint_protocol::{Codec, SessionId};
use waypoint_session::{
    generate_session_id, spawn_session, OutboundReceiver, SessionHandle,
};
use waypoint_transport::{
    Connection, ConnectionId, Handshake, PendingWebSocket, WebSocketConnection,
};

use crate::server::ServerState;
use crate::WaypointError;

/// Drop guard that tears a session down when the handler exits.
///
/// This runs even if the handler panics. `Drop` is synchronous, so the
/// async cleanup goes onto its own task. Any game in progress is dropped
/// with the session; no final summary is sent.
struct SessionGuard<C: Codec> {
    conn_id: ConnectionId,
    session: SessionHandle,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let session = self.session.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.registry.unregister(conn_id).await;
            let _ = session.shutdown().await;
        });
    }
}

/// Upgrades a freshly accepted peer, then serves it.
///
/// A peer that does not finish the handshake in time is dropped without
/// a session ever being created for it.
pub(crate) async fn handle_peer<C>(
    pending: PendingWebSocket,
    state: Arc<ServerState<C>>,
) -> Result<(), WaypointError>
where
    C: Codec + Clone,
{
    let conn_id = pending.id();
    let peer = pending.peer_addr();
    let limit = state.handshake_timeout;

    let conn = match tokio::time::timeout(limit, pending.upgrade()).await {
        Ok(upgraded) => upgraded?,
        Err(_) => {
            tracing::info!(%conn_id, %peer, ?limit, "handshake timed out, dropping peer");
            return Err(WaypointError::HandshakeTimeout(limit));
        }
    };
    handle_connection(conn, state).await
}

/// Handles a single upgraded connection until it closes.
async fn handle_connection<C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), WaypointError>
where
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let session_id = generate_session_id();

    let (session, outbound) = spawn_session(
        session_id.clone(),
        state.session_config.clone(),
        state.sink.clone(),
        state.codec.clone(),
    );
    state.registry.register(conn_id, session.clone()).await?;
    let _guard = SessionGuard {
        conn_id,
        session: session.clone(),
        state: Arc::clone(&state),
    };
    tracing::info!(%conn_id, %session_id, "client connected");

    let mut writer = tokio::spawn(write_outbound(
        Arc::clone(&conn),
        outbound,
        state.codec.clone(),
        session_id.clone(),
    ));

    let session_ended = loop {
        tokio::select! {
            received = conn.recv() => match received {
                Ok(Some(data)) => {
                    if let Err(e) = session.command(data).await {
                        tracing::warn!(%session_id, error = %e, "session stopped early");
                        break true;
                    }
                }
                Ok(None) => {
                    tracing::info!(%conn_id, %session_id, "client disconnected");
                    break false;
                }
                Err(e) => {
                    tracing::warn!(
                        %conn_id,
                        %session_id,
                        error = %e,
                        "transport error, dropping session"
                    );
                    break false;
                }
            },
            // The writer only finishes once the session has stopped.
            _ = &mut writer => {
                tracing::info!(%conn_id, %session_id, "session ended, closing connection");
                break true;
            }
        }
    };

    if session_ended {
        if let Err(e) = conn.close().await {
            tracing::debug!(%conn_id, error = %e, "close failed");
        }
    }

    // _guard drops here → unregister + shutdown.
    Ok(())
}

/// Encodes and sends every frame the session emits.
///
/// A failed send is logged and skipped; the reader loop notices a dead
/// connection on its own. Ends when the session stops.
async fn write_outbound<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut outbound: OutboundReceiver,
    codec: C,
    session_id: SessionId,
) {
    while let Some(msg) = outbound.recv().await {
        let bytes = match codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%session_id, error = %e, "failed to encode frame");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::warn!(%session_id, error = %e, "failed to send frame");
        }
    }
    tracing::debug!(%session_id, "writer stopped");
}
