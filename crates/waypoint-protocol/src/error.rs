//! Error types for the protocol layer.
//!
//! Each crate in Waypoint defines its own error enum. A `ProtocolError`
//! always means a frame could not be turned into (or out of) bytes.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (Rust value → bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (bytes → Rust value).
    ///
    /// Common causes: malformed JSON, a missing `command` field, or a
    /// `command` that is not a string.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
