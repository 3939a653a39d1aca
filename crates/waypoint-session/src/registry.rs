//! Session registry: which connection owns which session.
//!
//! Unlike the actors it points at, the registry is shared by every
//! connection handler, so it guards its map with an async `RwLock`.
//! Handlers only ever insert, look up, or remove their own entry; values
//! are handles, never shared session state.

use std::collections::HashMap;

use tokio::sync::RwLock;
use waypoint_transport::ConnectionId;

use crate::{SessionError, SessionHandle};

/// Maps live connections to their session handles.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConnectionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the session for a newly connected client.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRegistered`] if the connection
    /// already has a session. The transport hands out fresh ids, so this
    /// indicates a bug upstream.
    pub async fn register(
        &self,
        conn_id: ConnectionId,
        handle: SessionHandle,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&conn_id) {
            return Err(SessionError::AlreadyRegistered(conn_id));
        }
        tracing::debug!(
            %conn_id,
            session_id = %handle.session_id(),
            "session registered"
        );
        sessions.insert(conn_id, handle);
        Ok(())
    }

    /// Looks up the session for a connection.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if none is registered.
    pub async fn lookup(
        &self,
        conn_id: ConnectionId,
    ) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(&conn_id)
            .cloned()
            .ok_or(SessionError::NotFound(conn_id))
    }

    /// Removes and returns the session for a connection, if any.
    pub async fn unregister(&self, conn_id: ConnectionId) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(&conn_id);
        if let Some(handle) = &removed {
            tracing::debug!(
                %conn_id,
                session_id = %handle.session_id(),
                "session unregistered"
            );
        }
        removed
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
