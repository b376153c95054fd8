//! Error types for the protocol layer.
//!
//! Each crate in Broadside defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the shape of a frame, not in
//! networking or in game state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not a valid `{type, data}` envelope.
    ///
    /// Common causes: malformed JSON, a missing `type` field, or a binary
    /// frame that is not UTF-8 JSON at all.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope was well formed but its `data` did not match the shape
    /// registered for its `type`.
    #[error("invalid `{kind}` payload: {source}")]
    InvalidData {
        /// The envelope `type` whose payload failed to decode.
        kind: String,
        /// What serde_json objected to.
        #[source]
        source: serde_json::Error,
    },

    /// The message is invalid at the protocol level.
    ///
    /// This is for logical errors that pass deserialization but violate
    /// protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
