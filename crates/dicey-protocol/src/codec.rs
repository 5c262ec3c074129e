//! Codecs: turning requests, responses and snapshots into bytes.
//!
//! Nothing above this module cares how a [`RoomSnapshot`](crate::RoomSnapshot)
//! is laid out on the wire. The service is handed a [`Codec`] and uses it
//! for both directions, so a binary format can replace [`JsonCodec`]
//! without touching dispatch code.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back into values.
///
/// `Send + Sync + 'static` because a single codec instance is shared by
/// every request the service handles, across Tokio worker threads.
pub trait Codec: Send + Sync + 'static {
    /// Writes `value` out in this codec's format.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Reads a `T` back out of `bytes`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match the shape of `T`.
    fn decode<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Human-readable, which is what a polling web client wants anyway.
/// Behind the `json` feature (on by default).
///
/// ```rust
/// use dicey_protocol::{Codec, Envelope, JsonCodec, Request};
///
/// let json = JsonCodec;
/// let envelope = Envelope::new(1, 5000, Request::GetSnapshot {
///     code: "PIZZA1".into(),
/// });
///
/// let wire = json.encode(&envelope).unwrap();
/// let back: Envelope<Request> = json.decode(&wire).unwrap();
/// assert_eq!(back.body, envelope.body);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }
}
