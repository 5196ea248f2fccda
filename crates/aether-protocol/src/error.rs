//! Error types for the protocol layer.
//!
//! Each crate in Aether Party defines its own error enum. This keeps errors
//! specific and meaningful — when you see a `ProtocolError`, you know
//! the problem is in serialization/deserialization, not in networking
//! or room management.

/// Errors that can occur in the protocol layer.
///
/// `#[derive(thiserror::Error)]` auto-generates the `std::error::Error`
/// trait implementation. The `#[error("...")]` attributes define the
/// human-readable message for each variant — what you see when you
/// print the error or it shows up in logs.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a value to bytes failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserializing bytes into a value failed — maps to the `4000`
    /// malformed-JSON close per §6.1/§7.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed as JSON but lacked a `type` field — `4001`.
    #[error("envelope missing required `type` field")]
    MissingType,

    /// The `type` field named a handler the router doesn't recognize — `4004`.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The frame is structurally invalid beyond JSON syntax — e.g. a
    /// `payload` that isn't an object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
