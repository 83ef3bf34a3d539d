//! Codec trait and implementations for serializing/deserializing events.
//!
//! The protocol layer doesn't care HOW messages are serialized — anything
//! implementing [`Codec`] will do. We ship [`JsonCodec`] (human-readable,
//! matches what browser clients speak); a binary codec could be swapped in
//! later without touching any other layer.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is shared across connection
/// handler tasks. `DeserializeOwned` (rather than `Deserialize<'de>`)
/// because decoded values must outlive the receive buffer.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use knockout_protocol::{Codec, ClientEvent, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ClientEvent::JoinQueue).unwrap();
/// let decoded: ClientEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ClientEvent::JoinQueue);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
