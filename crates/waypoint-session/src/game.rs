//! Game records: one bounded run of moves inside a session.
//!
//! A game opens on the first accepted move after the session was idle
//! and closes when the inactivity timer fires:
//!
//! ```text
//!   Idle ──(accepted move)──→ InGame ──(accepted move)──→ InGame
//!    ↑                           │
//!    └────(inactivity timeout)───┘   emits gameOver + positionUpdate(0,0)
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use waypoint_protocol::{GameId, Position, ServerMessage};

/// An in-progress game.
#[derive(Debug, Clone)]
pub struct Game {
    id: GameId,
    start_position: Position,
    start_time: SystemTime,
    last_position: Position,
    moves: u64,
}

impl Game {
    /// Opens a game at `start_position`.
    ///
    /// `last_position` starts equal to `start_position`, so a game closed
    /// before any move lands reports a distance of 0.
    pub fn start(id: GameId, start_position: Position, start_time: SystemTime) -> Self {
        Self {
            id,
            start_position,
            start_time,
            last_position: start_position,
            moves: 0,
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn start_position(&self) -> Position {
        self.start_position
    }

    pub fn last_position(&self) -> Position {
        self.last_position
    }

    /// Number of accepted moves so far.
    pub fn moves(&self) -> u64 {
        self.moves
    }

    /// Records the position reached by an accepted move.
    pub fn record_move(&mut self, position: Position) {
        self.last_position = position;
        self.moves += 1;
    }

    /// Straight-line distance from the start to the last position.
    pub fn distance(&self) -> f64 {
        self.start_position.distance_to(self.last_position)
    }

    /// Closes the game, producing its summary.
    pub fn finish(self, end_time: SystemTime) -> GameSummary {
        GameSummary {
            distance: self.distance(),
            game_id: self.id,
            start_position: self.start_position,
            end_position: self.last_position,
            moves: self.moves,
            start_time: self.start_time,
            end_time,
        }
    }
}

/// What's left of a game once it has closed.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub game_id: GameId,
    pub start_position: Position,
    pub end_position: Position,
    pub moves: u64,
    pub distance: f64,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
}

impl GameSummary {
    /// The `gameOver` frame for this summary. Distance is rounded to two
    /// decimals, matching what deployed clients display.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::GameOver {
            game_id: self.game_id.clone(),
            distance: round2(self.distance),
            start_time: unix_millis(self.start_time),
            end_time: unix_millis(self.end_time),
        }
    }
}

/// Milliseconds since the Unix epoch; clocks set before 1970 read as 0.
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
