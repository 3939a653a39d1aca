//! `Server` builder and accept loop.
//!
//! This ties the layers together: transport → protocol → session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use waypoint_protocol::{Codec, JsonCodec};
use waypoint_session::{
    spawn_sink_writer, MovementSink, SessionConfig, SessionRegistry,
    SinkHandle,
};
use waypoint_transport::{Transport, WebSocketTransport};

use crate::handler::handle_peer;
use crate::WaypointError;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared server state passed to each connection handler task.
///
/// Nothing in here is per-client: sessions live in their own actors and
/// the registry only holds handles to them.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) session_config: SessionConfig,
    pub(crate) handshake_timeout: Duration,
    pub(crate) sink: SinkHandle,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Waypoint server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .inactivity_timeout(Duration::from_secs(10))
///     .build(JsonLinesSink::open("movements.jsonl").await?)
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    handshake_timeout: Duration,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Shorthand for overriding only the inactivity timeout.
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.session_config.inactivity_timeout = timeout;
        self
    }

    /// How long a freshly accepted peer gets to complete the WebSocket
    /// upgrade before it is dropped.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and starts the movement sink writer.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S: MovementSink>(
        self,
        sink: S,
    ) -> Result<Server<JsonCodec>, WaypointError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Arc::new(SessionRegistry::new()),
            session_config: self.session_config,
            handshake_timeout: self.handshake_timeout,
            sink: spawn_sink_writer(sink),
            codec: JsonCodec,
        });

        Ok(Server { transport, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Waypoint server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C: Codec + Clone> Server<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of live sessions.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), WaypointError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Stops accepting new connections; sessions already running finish
    /// on their own when their clients disconnect.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), WaypointError> {
        tracing::info!(
            timeout_ms = self.state.session_config.inactivity_timeout.as_millis() as u64,
            "Waypoint server running"
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested, no longer accepting");
                    self.transport.shutdown().await?;
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_peer(pending, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }
}
