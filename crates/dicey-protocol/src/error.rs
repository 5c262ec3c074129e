//! What can go wrong below the room rules: bytes and identifiers.

use thiserror::Error;

/// Errors that can occur while parsing identifiers or moving messages
/// through a [`Codec`](crate::Codec).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("could not encode message: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or an
    /// unknown request `type`.
    #[cfg(feature = "json")]
    #[error("could not decode message: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but is not acceptable at the protocol level.
    #[error("unacceptable message: {0}")]
    InvalidMessage(String),

    /// A room code that is not six characters from the room-code alphabet.
    #[error("invalid room code {0:?}")]
    InvalidRoomCode(String),
}
