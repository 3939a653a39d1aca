//! Integration tests for the session actor and game lifecycle.
//!
//! Uses `start_paused = true` so the inactivity timer is deterministic:
//! whenever every task is waiting, Tokio jumps the clock straight to the
//! next timer instead of really sleeping.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use waypoint_protocol::{JsonCodec, Position, ServerMessage, SessionId};
use waypoint_session::{
    spawn_session, spawn_sink_writer, MovementRecord, MovementSink,
    OutboundReceiver, SessionConfig, SessionHandle, SinkError,
};

// =========================================================================
// Helpers
// =========================================================================

const TIMEOUT: Duration = Duration::from_secs(10);

type Store = Arc<Mutex<Vec<MovementRecord>>>;

/// Keeps every record in memory.
struct MemorySink(Store);

impl MovementSink for MemorySink {
    async fn append(&self, record: &MovementRecord) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Rejects every record.
struct BrokenSink;

impl MovementSink for BrokenSink {
    async fn append(&self, _record: &MovementRecord) -> Result<(), SinkError> {
        Err(SinkError::Io(std::io::Error::other("store unreachable")))
    }
}

fn config() -> SessionConfig {
    SessionConfig {
        inactivity_timeout: TIMEOUT,
        ..SessionConfig::default()
    }
}

/// Spawns a session backed by a memory sink. The `initialState` frame is
/// consumed and checked.
async fn start(id: &str) -> (SessionHandle, OutboundReceiver, Store) {
    let store: Store = Arc::default();
    let sink = spawn_sink_writer(MemorySink(Arc::clone(&store)));
    let (handle, mut out) =
        spawn_session(SessionId::new(id), config(), sink, JsonCodec);

    assert_eq!(
        next(&mut out).await,
        ServerMessage::InitialState { x: 0, y: 0 }
    );
    (handle, out, store)
}

async fn next(out: &mut OutboundReceiver) -> ServerMessage {
    out.recv().await.expect("session should still be running")
}

async fn send(handle: &SessionHandle, command: &str) {
    let raw = format!(r#"{{"command":"{command}"}}"#).into_bytes();
    handle.command(raw).await.expect("session should accept frames");
}

async fn records_after_settle(store: &Store) -> Vec<MovementRecord> {
    // Lets the writer task drain without moving the clock.
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    store.lock().unwrap().clone()
}

fn assert_quiet(out: &mut OutboundReceiver) {
    assert!(
        matches!(out.try_recv(), Err(TryRecvError::Empty)),
        "expected no further frames"
    );
}

/// The paused clock lands on timer deadlines, give or take the driver's
/// millisecond granularity.
fn assert_elapsed_timeout(since: Instant) {
    let elapsed = since.elapsed();
    assert!(
        elapsed >= TIMEOUT && elapsed < TIMEOUT + Duration::from_millis(50),
        "expected ~{TIMEOUT:?}, got {elapsed:?}"
    );
}

fn game_over_distance(msg: &ServerMessage) -> f64 {
    match msg {
        ServerMessage::GameOver { distance, .. } => *distance,
        other => panic!("expected GameOver, got {other:?}"),
    }
}

// =========================================================================
// Game lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_right_up_then_idle_emits_game_over_and_reset() {
    let (handle, mut out, _store) = start("aaaa0001").await;

    send(&handle, "right").await;
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 1, y: 0 });
    send(&handle, "up").await;
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 1, y: -1 });
    let last_move = Instant::now();

    let over = next(&mut out).await;
    assert_elapsed_timeout(last_move);
    assert_eq!(game_over_distance(&over), 1.41);
    match &over {
        ServerMessage::GameOver {
            game_id,
            start_time,
            end_time,
            ..
        } => {
            assert!(game_id.as_str().starts_with("G_"));
            assert!(game_id.as_str().contains("_aaaa_"));
            assert!(end_time >= start_time);
        }
        other => panic!("expected GameOver, got {other:?}"),
    }
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 0, y: 0 });

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.position, Position::ORIGIN);
    assert_eq!(snap.game_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_game_distance_is_start_to_end_straight_line() {
    let (handle, mut out, _store) = start("aaaa0002").await;

    for command in ["right", "right", "up"] {
        send(&handle, command).await;
        next(&mut out).await;
    }
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.position, Position::new(2, -1));
    assert_eq!(snap.game_start, Some(Position::ORIGIN));

    assert_eq!(game_over_distance(&next(&mut out).await), 2.24);
}

#[tokio::test(start_paused = true)]
async fn test_game_over_fires_exactly_once() {
    let (handle, mut out, _store) = start("aaaa0003").await;

    send(&handle, "down").await;
    next(&mut out).await;
    game_over_distance(&next(&mut out).await);
    next(&mut out).await; // reset

    tokio::time::sleep(TIMEOUT * 6).await;
    assert_quiet(&mut out);
}

#[tokio::test(start_paused = true)]
async fn test_accepted_move_rearms_inactivity_timer() {
    let (handle, mut out, _store) = start("aaaa0004").await;

    send(&handle, "left").await;
    next(&mut out).await;
    tokio::time::sleep(Duration::from_secs(6)).await;

    send(&handle, "left").await;
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: -2, y: 0 });
    let rearmed_at = Instant::now();
    tokio::time::sleep(Duration::from_secs(6)).await;

    // 12 s since the first move, but only 6 s since the last one.
    assert_quiet(&mut out);
    assert!(handle.snapshot().await.unwrap().game_id.is_some());

    game_over_distance(&next(&mut out).await);
    assert_elapsed_timeout(rearmed_at);
}

#[tokio::test(start_paused = true)]
async fn test_next_game_after_game_over_starts_at_origin() {
    let (handle, mut out, _store) = start("aaaa0005").await;

    for command in ["right", "right", "down"] {
        send(&handle, command).await;
        next(&mut out).await;
    }
    let first_game = handle.snapshot().await.unwrap().game_id.unwrap();
    next(&mut out).await; // gameOver
    next(&mut out).await; // reset

    send(&handle, "up").await;
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 0, y: -1 });

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.game_start, Some(Position::ORIGIN));
    assert_eq!(snap.games_started, 2);
    assert_ne!(snap.game_id.unwrap(), first_game);
}

#[tokio::test(start_paused = true)]
async fn test_position_is_vector_sum_of_moves() {
    let (handle, mut out, _store) = start("aaaa0006").await;
    let commands = ["up", "up", "left", "down", "right", "right", "right"];

    for command in commands {
        send(&handle, command).await;
        next(&mut out).await;
    }

    assert_eq!(handle.snapshot().await.unwrap().position, Position::new(2, -1));
}

// =========================================================================
// Rejected frames
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_unknown_command_changes_nothing() {
    let (handle, mut out, store) = start("bbbb0001").await;

    for _ in 0..3 {
        send(&handle, "jump").await;
        match next(&mut out).await {
            ServerMessage::Error { message } => assert!(message.contains("jump")),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.position, Position::ORIGIN);
    assert_eq!(snap.game_id, None);
    assert_eq!(snap.games_started, 0);

    // No timer was armed, so nothing fires.
    tokio::time::sleep(TIMEOUT * 3).await;
    assert_quiet(&mut out);
    assert!(records_after_settle(&store).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_mid_game_does_not_rearm_timer() {
    let (handle, mut out, _store) = start("bbbb0002").await;

    send(&handle, "right").await;
    next(&mut out).await;
    let moved_at = Instant::now();
    tokio::time::sleep(Duration::from_secs(5)).await;

    send(&handle, "Right").await;
    assert!(matches!(next(&mut out).await, ServerMessage::Error { .. }));

    game_over_distance(&next(&mut out).await);
    assert_elapsed_timeout(moved_at);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payloads_each_get_one_error_and_no_writes() {
    let (handle, mut out, store) = start("bbbb0003").await;

    let frames: [&[u8]; 4] = [b"{}", br#"{"command":5}"#, b"not json", br#"{"command":null}"#];
    for frame in frames {
        handle.command(frame.to_vec()).await.unwrap();
        match next(&mut out).await {
            ServerMessage::Error { message } => {
                assert!(message.starts_with("malformed payload"), "{message}")
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    assert_quiet(&mut out);
    assert_eq!(handle.snapshot().await.unwrap().game_id, None);
    assert!(records_after_settle(&store).await.is_empty());
}

// =========================================================================
// Movement sink
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_each_accepted_move_writes_one_record() {
    let (handle, mut out, store) = start("cccc0001").await;

    for command in ["right", "jump", "down"] {
        send(&handle, command).await;
        next(&mut out).await;
    }
    let game_id = handle.snapshot().await.unwrap().game_id.unwrap();

    let records = records_after_settle(&store).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].command, "right");
    assert_eq!((records[0].x, records[0].y), (1, 0));
    assert_eq!(records[1].command, "down");
    assert_eq!((records[1].x, records[1].y), (1, 1));
    for record in &records {
        assert_eq!(record.game_id, game_id);
        assert_eq!(record.session_id.as_str(), "cccc0001");
    }
}

#[tokio::test(start_paused = true)]
async fn test_sink_failure_does_not_block_position_update() {
    let (handle, mut out) = spawn_session(
        SessionId::new("cccc0002"),
        config(),
        spawn_sink_writer(BrokenSink),
        JsonCodec,
    );
    next(&mut out).await;

    send(&handle, "down").await;
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 0, y: 1 });
    send(&handle, "down").await;
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 0, y: 2 });

    assert_eq!(game_over_distance(&next(&mut out).await), 2.0);
}

// =========================================================================
// Isolation & teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sessions_are_independent() {
    let (a, mut out_a, _) = start("dddd0001").await;
    let (b, mut out_b, _) = start("eeee0002").await;

    send(&a, "right").await;
    send(&b, "up").await;
    send(&a, "right").await;
    tokio::time::sleep(Duration::from_secs(4)).await;
    send(&b, "up").await;
    send(&b, "up").await;

    let snap_a = a.snapshot().await.unwrap();
    let snap_b = b.snapshot().await.unwrap();
    assert_eq!(snap_a.position, Position::new(2, 0));
    assert_eq!(snap_b.position, Position::new(0, -3));
    assert_ne!(snap_a.game_id, snap_b.game_id);

    for _ in 0..2 {
        next(&mut out_a).await;
    }
    for _ in 0..3 {
        next(&mut out_b).await;
    }

    // A's game closes first; B's was rearmed 4 s later.
    assert_eq!(game_over_distance(&next(&mut out_a).await), 2.0);
    assert_quiet(&mut out_b);
    assert_eq!(game_over_distance(&next(&mut out_b).await), 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_discards_game_without_summary() {
    let (handle, mut out, _store) = start("ffff0001").await;

    send(&handle, "right").await;
    next(&mut out).await;
    handle.shutdown().await.unwrap();

    // The actor stops and drops its outbound sender: no gameOver, ever.
    assert_eq!(out.recv().await, None);
    assert!(handle.is_closed());
    assert!(handle.snapshot().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_session() {
    let (handle, mut out, _store) = start("ffff0002").await;
    send(&handle, "left").await;
    next(&mut out).await;

    drop(handle);
    assert_eq!(out.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_client_that_stops_reading_closes_session() {
    let store: Store = Arc::default();
    let sink = spawn_sink_writer(MemorySink(Arc::clone(&store)));
    let config = SessionConfig {
        outbound_capacity: 3,
        ..config()
    };
    let (handle, mut out) =
        spawn_session(SessionId::new("ffff0003"), config, sink, JsonCodec);

    // Nobody drains `out`: initialState plus two updates fill the queue,
    // the third update overflows it.
    for _ in 0..5 {
        let raw = br#"{"command":"right"}"#.to_vec();
        let _ = handle.command(raw).await;
    }

    assert_eq!(next(&mut out).await, ServerMessage::InitialState { x: 0, y: 0 });
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 1, y: 0 });
    assert_eq!(next(&mut out).await, ServerMessage::PositionUpdate { x: 2, y: 0 });
    assert_eq!(out.recv().await, None);
    assert!(handle.is_closed());
}
