//! Session actor: one Tokio task per connected client.
//!
//! The actor owns everything about its client (position, active game and
//! inactivity deadline), and nothing else can touch it. Inbound commands
//! and the inactivity timer are both handled inside the same
//! `tokio::select!` loop, so a timer firing can never interleave with a
//! half-applied move.
//!
//! Outbound frames wait in a bounded queue. A client that lets it fill
//! up is not reading its socket, and the session stops rather than
//! buffering without limit.
//!
//! ```text
//! connection reader ──command(raw)──→ [mpsc] ──→ SessionActor ──→ [outbound] ──→ connection writer
//!                                                   │    ↑
//!                                       submit()    │    └── inactivity deadline (sleep_until)
//!                                                   ▼
//!                                               SinkHandle
//! ```

use std::time::SystemTime;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use waypoint_protocol::{
    ClientMessage, Codec, GameId, Position, ServerMessage, SessionId,
};

use crate::game::unix_millis;
use crate::{position, Game, MovementRecord, SessionConfig, SessionError, SinkHandle};

/// Receives the frames a session wants delivered to its client.
pub type OutboundReceiver = mpsc::Receiver<ServerMessage>;

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    /// A raw inbound frame from the client.
    Frame { raw: Vec<u8> },

    /// Request a read-only view of the session.
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },

    /// Stop the actor. Any active game is discarded without a summary.
    Shutdown,
}

/// A point-in-time view of a session, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub position: Position,
    /// `Some` iff a game is in progress.
    pub game_id: Option<GameId>,
    pub game_start: Option<Position>,
    /// Games opened over the session's lifetime.
    pub games_started: u64,
}

/// Handle to a running session actor.
///
/// Cheap to clone. The registry and the connection handler each hold one.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Delivers one inbound frame. The outcome arrives on the session's
    /// outbound channel, not here.
    pub async fn command(&self, raw: Vec<u8>) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Frame { raw })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Requests a snapshot of the session's state.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the session to stop, cancelling its inactivity timer.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> SessionError {
        SessionError::Unavailable(self.session_id.clone())
    }
}

/// The internal session state. Runs inside its own Tokio task.
struct SessionActor<C: Codec> {
    session_id: SessionId,
    config: SessionConfig,
    codec: C,
    position: Position,
    game: Option<Game>,
    games_started: u64,
    /// Instant of the most recent accepted move; the inactivity deadline
    /// is measured from here. `None` while idle.
    last_move_at: Option<Instant>,
    sink: SinkHandle,
    outbound: mpsc::Sender<ServerMessage>,
    /// Set once the outbound queue overflows; the actor stops after the
    /// current command.
    backlogged: bool,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<C: Codec> SessionActor<C> {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "session started");
        self.send(ServerMessage::initial_state(self.position));

        loop {
            // Pends forever while idle, so only commands can wake us.
            let deadline = self.deadline();
            let expiry = async move {
                match deadline {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(SessionCommand::Frame { raw }) => {
                        self.handle_frame(&raw);
                    }
                    Some(SessionCommand::Snapshot { reply }) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
                () = expiry => self.end_game(),
            }

            if self.backlogged {
                break;
            }
        }

        if let Some(game) = &self.game {
            tracing::info!(
                session_id = %self.session_id,
                game_id = %game.id(),
                moves = game.moves(),
                "session closed with game in progress, discarding"
            );
        }
        tracing::info!(session_id = %self.session_id, "session stopped");
    }

    fn deadline(&self) -> Option<Instant> {
        self.last_move_at
            .map(|at| at + self.config.inactivity_timeout)
    }

    fn handle_frame(&mut self, raw: &[u8]) {
        let result = self
            .codec
            .decode::<ClientMessage>(raw)
            .map_err(|e| SessionError::MalformedPayload(e.to_string()))
            .and_then(|msg| self.accept_move(msg.command));

        match result {
            Ok(position) => {
                self.send(ServerMessage::position_update(position));
            }
            Err(e) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    error = %e,
                    "rejected frame"
                );
                self.send(ServerMessage::error(e.to_string()));
            }
        }
    }

    /// Applies a move, opening a game first if the session is idle.
    /// Nothing is mutated unless the command is recognized.
    fn accept_move(&mut self, command: String) -> Result<Position, SessionError> {
        let next = position::apply(self.position, &command)?;
        let now = SystemTime::now();

        let mut game = match self.game.take() {
            Some(game) => game,
            None => {
                self.games_started += 1;
                let id = GameId::new(
                    unix_millis(now),
                    &self.session_id,
                    self.games_started,
                );
                tracing::info!(
                    session_id = %self.session_id,
                    game_id = %id,
                    start = %self.position,
                    "game started"
                );
                Game::start(id, self.position, now)
            }
        };
        game.record_move(next);

        self.sink.submit(MovementRecord {
            game_id: game.id().clone(),
            session_id: self.session_id.clone(),
            command,
            x: next.x,
            y: next.y,
            timestamp: unix_millis(now),
        });

        self.game = Some(game);
        self.position = next;
        self.last_move_at = Some(Instant::now());

        tracing::debug!(
            session_id = %self.session_id,
            position = %next,
            "move accepted"
        );
        Ok(next)
    }

    /// Closes the active game on inactivity and resets to the origin.
    fn end_game(&mut self) {
        self.last_move_at = None;
        let Some(game) = self.game.take() else {
            return;
        };

        let summary = game.finish(SystemTime::now());
        tracing::info!(
            session_id = %self.session_id,
            game_id = %summary.game_id,
            start = %summary.start_position,
            end = %summary.end_position,
            moves = summary.moves,
            distance = summary.distance,
            "game over (inactivity)"
        );

        self.send(summary.to_message());
        self.position = Position::ORIGIN;
        self.send(ServerMessage::position_update(self.position));
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            position: self.position,
            game_id: self.game.as_ref().map(|g| g.id().clone()),
            game_start: self.game.as_ref().map(Game::start_position),
            games_started: self.games_started,
        }
    }

    /// Queues a frame for the client. A closed outbound channel means the
    /// connection is already gone; the handler will shut us down.
    fn send(&mut self, msg: ServerMessage) {
        if self.backlogged {
            return;
        }
        match self.outbound.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    capacity = self.config.outbound_capacity,
                    "client is not reading, closing session"
                );
                self.backlogged = true;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    "outbound channel closed, frame dropped"
                );
            }
        }
    }
}

/// Spawns a session actor and returns its handle plus the receiver for
/// frames bound to the client. The first outbound frame is always
/// `initialState` at the origin.
pub fn spawn_session<C: Codec>(
    session_id: SessionId,
    config: SessionConfig,
    sink: SinkHandle,
    codec: C,
) -> (SessionHandle, OutboundReceiver) {
    let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
    let (out_tx, out_rx) = mpsc::channel(config.outbound_capacity.max(1));

    let actor = SessionActor {
        session_id: session_id.clone(),
        config,
        codec,
        position: Position::ORIGIN,
        game: None,
        games_started: 0,
        last_move_at: None,
        sink,
        outbound: out_tx,
        backlogged: false,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    (
        SessionHandle {
            session_id,
            sender: tx,
        },
        out_rx,
    )
}

/// Generates a random 32-character hex session id (128 bits).
pub fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    SessionId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
