//! Codec trait and implementations for serializing/deserializing frames.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The session driver doesn't care HOW frames are serialized — it just
//! needs something that implements the [`Codec`] trait.
//!
//! The game server speaks JSON text frames, so [`JsonCodec`] is the only
//! implementation today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share with the driver task, which Tokio may
///   run on any worker thread.
/// - `'static` → the codec owns everything it needs, so it can live inside
///   a long-lived async task.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means the result doesn't
/// borrow from the input bytes, so the frame buffer can be dropped right
/// after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use broadside_protocol::{Codec, Command, Coord, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let bytes = codec.encode(&Command::Attack(Coord(2, 3))).unwrap();
/// assert_eq!(bytes, br#"{"type":"attack","data":[2,3]}"#);
///
/// // Any frame can be read back as a raw envelope.
/// let envelope: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope.kind, "attack");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
