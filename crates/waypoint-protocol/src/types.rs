//! Core protocol types for Waypoint's wire format.
//!
//! Every type here travels on the wire as JSON: the frames a client sends,
//! the frames the server sends back, and the identifiers they carry.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier for one connected client's session.
///
/// Assigned at connect time and never changed. It only exists for
/// correlation: logs and movement records carry it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an already generated identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first four characters, used as a compact tag inside game ids.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(4)
            .map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one game: a run of moves bounded by inactivity.
///
/// Rendered as `G_<unix-millis>_<session tag>_<ordinal>`. The ordinal is
/// the game's position in the session's lifetime, so two games that start
/// within the same millisecond still get different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Builds the id for the `ordinal`-th game of `session`.
    pub fn new(started_at_ms: u64, session: &SessionId, ordinal: u64) -> Self {
        Self(format!("G_{started_at_ms}_{}_{ordinal}", session.short()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Position & Direction
// ---------------------------------------------------------------------------

/// A point on the unbounded integer grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    /// Where every session starts, and where it returns after a game.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one unit step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Straight-line (Euclidean) distance to `other`.
    pub fn distance_to(self, other: Self) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        dx.hypot(dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four movement commands a client may send.
///
/// Coordinates follow screen convention, y grows downward:
///
/// | command | effect |
/// |---------|--------|
/// | `up`    | y − 1  |
/// | `down`  | y + 1  |
/// | `left`  | x − 1  |
/// | `right` | x + 1  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Parses a command string. Matching is exact and case-sensitive.
    pub fn from_command(command: &str) -> Option<Self> {
        match command {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// The wire spelling of this command.
    pub fn as_command(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Unit offset `(dx, dy)` applied by this command.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_command())
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// The only frame a client sends: `{"command": "..."}`.
///
/// `command` is kept as a raw string so that an unrecognized command
/// (well-formed but unknown) can be told apart from a malformed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub command: String,
}

/// Frames the server sends to a client.
///
/// Serialized flat with a `type` tag, e.g.
/// `{"type":"positionUpdate","x":1,"y":0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Sent once, right after connect.
    InitialState { x: i64, y: i64 },

    /// The authoritative position after a move, or after a game reset.
    PositionUpdate { x: i64, y: i64 },

    /// The last frame could not be applied; nothing changed.
    Error { message: String },

    /// A game closed on inactivity.
    GameOver {
        game_id: GameId,
        /// Straight-line distance from start to final position,
        /// rounded to two decimals.
        distance: f64,
        /// Unix epoch milliseconds.
        start_time: u64,
        /// Unix epoch milliseconds.
        end_time: u64,
    },
}

impl ServerMessage {
    pub fn initial_state(position: Position) -> Self {
        Self::InitialState {
            x: position.x,
            y: position.y,
        }
    }

    pub fn position_update(position: Position) -> Self {
        Self::PositionUpdate {
            x: position.x,
            y: position.y,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
