//! The position engine: (position, command) → position.
//!
//! Pure and deterministic. No session, clock, or I/O is involved, which
//! is what lets the session actor treat a failed move as a no-op.

use waypoint_protocol::{Direction, Position};

use crate::SessionError;

/// Applies one movement command to `position`.
///
/// See [`Direction`] for the axis convention.
///
/// # Errors
/// Returns [`SessionError::UnknownCommand`] for anything other than the
/// exact strings `up`, `down`, `left`, `right`.
pub fn apply(position: Position, command: &str) -> Result<Position, SessionError> {
    Direction::from_command(command)
        .map(|direction| position.step(direction))
        .ok_or_else(|| SessionError::UnknownCommand(command.to_string()))
}
