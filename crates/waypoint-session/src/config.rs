//! Session configuration.

use std::time::Duration;

/// Configuration shared by every session on a server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a game may go without an accepted move before it is
    /// closed and summarized.
    ///
    /// Default: 10 seconds.
    pub inactivity_timeout: Duration,

    /// Capacity of each session's inbound command channel. When it is
    /// full the connection's reader waits, which pushes back on a client
    /// that floods commands.
    pub command_capacity: usize,

    /// How many frames may wait for a client that is not reading its
    /// socket. Going over this closes the session.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(10),
            command_capacity: 64,
            outbound_capacity: 256,
        }
    }
}
