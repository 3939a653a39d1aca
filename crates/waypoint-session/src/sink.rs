//! Movement log: one append-only record per accepted move.
//!
//! Sessions never wait on the log. Each accepted move is pushed onto an
//! unbounded channel and a dedicated writer task drains it into a
//! [`MovementSink`]. If the sink fails, the writer logs the failure and
//! the record is lost; the client has already seen its new position.
//!
//! ```text
//! Session ──submit()──→ [channel] ──→ SinkWriter task ──append()──→ MovementSink
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use waypoint_protocol::{GameId, SessionId};

use crate::SinkError;

/// One accepted move, as written to the movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRecord {
    pub game_id: GameId,
    pub session_id: SessionId,
    pub command: String,
    /// Position after the move.
    pub x: i64,
    pub y: i64,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
}

/// An append-only store of movement records.
///
/// The returned future must be `Send` because appends run on the
/// writer's own Tokio task.
pub trait MovementSink: Send + Sync + 'static {
    /// Durably appends one record.
    fn append(
        &self,
        record: &MovementRecord,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

/// Handle for submitting records to a running sink writer.
///
/// Cheap to clone; every session holds one.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    sender: mpsc::UnboundedSender<MovementRecord>,
}

impl SinkHandle {
    /// Queues a record without waiting for it to be written.
    pub fn submit(&self, record: MovementRecord) {
        if let Err(mpsc::error::SendError(record)) = self.sender.send(record) {
            tracing::error!(
                game_id = %record.game_id,
                session_id = %record.session_id,
                "movement sink writer has stopped, record dropped"
            );
        }
    }
}

/// Spawns the writer task that feeds `sink` and returns its handle.
///
/// The task ends once every [`SinkHandle`] has been dropped and the
/// queue is drained.
pub fn spawn_sink_writer<S: MovementSink>(sink: S) -> SinkHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<MovementRecord>();

    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            if let Err(e) = sink.append(&record).await {
                tracing::warn!(
                    game_id = %record.game_id,
                    session_id = %record.session_id,
                    command = %record.command,
                    error = %e,
                    "failed to store movement"
                );
            }
        }
        tracing::debug!("movement sink writer stopped");
    });

    SinkHandle { sender: tx }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Appends records as newline-delimited JSON to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl JsonLinesSink {
    /// Opens (or creates) `path` for appending.
    ///
    /// # Errors
    /// Returns [`SinkError::Io`] if the file can't be opened. The server
    /// treats that as fatal at startup.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MovementSink for JsonLinesSink {
    async fn append(&self, record: &MovementRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Writes records to the tracing log only. Used when no movement log
/// is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl MovementSink for LogSink {
    async fn append(&self, record: &MovementRecord) -> Result<(), SinkError> {
        tracing::info!(
            game_id = %record.game_id,
            session_id = %record.session_id,
            command = %record.command,
            x = record.x,
            y = record.y,
            "movement"
        );
        Ok(())
    }
}
