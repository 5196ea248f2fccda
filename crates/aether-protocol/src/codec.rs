//! Codec trait and implementation for wire (de)serialization.
//!
//! A codec converts between Rust types and the raw bytes that cross the
//! transport. The spec (§6.1) fixes the wire format to UTF-8 JSON text, so
//! [`JsonCodec`] is the only implementation this crate ships — but the
//! trait keeps the door open for a binary codec on a future transport.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back into Rust values.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError>;
}

/// UTF-8 JSON codec — the wire format mandated by §6.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn test_json_round_trip() {
        let codec = JsonCodec;
        let value = Sample { a: 1, b: "hi".into() };
        let bytes = codec.encode(&value).unwrap();
        let decoded: Sample = codec.decode(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn test_decode_malformed_json_fails() {
        let codec = JsonCodec;
        let result: Result<Sample, _> = codec.decode(b"not json");
        assert!(result.is_err());
    }
}
