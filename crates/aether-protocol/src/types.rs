//! Core wire types for the Aether Party protocol.
//!
//! Every frame on the wire is a single JSON object discriminated by its
//! `type` field (§6.1). Inbound frames accept two equivalent shapes: fields
//! may sit flat at the top level, or nested under a `payload` object, or
//! both — in which case `payload` wins and flat fields are used as
//! defaults (§4.2). Outbound frames always use the flat shape, except
//! `game_sync` which nests its snapshot under `state`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A durable user identity (distinct from a transport [`SessionId`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A live transport session, independent of whether it's authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// A room — a membership + game-state container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient — who gets a fan-out
// ---------------------------------------------------------------------------

/// Specifies who should receive an outbound envelope produced by a
/// service or game instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// A single user, by user id.
    User(UserId),
    /// Every session currently joined to a room.
    Room(RoomId),
    /// Every session subscribed to a named chat channel.
    Channel(String),
    /// Every authenticated session.
    Broadcast,
}

// ---------------------------------------------------------------------------
// Envelope — inbound (dual shape)
// ---------------------------------------------------------------------------

/// The raw inbound frame as it arrives off the wire.
///
/// `type` is the only field the router strictly requires. Everything
/// else may appear flat at the top level, nested under `payload`, or
/// both — the router merges `extra` (flat fields) and `payload`
/// (nested fields), letting `payload` take precedence (§4.2).
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub timestamp: Option<u64>,
    pub msg_id: Option<String>,
    pub payload: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl InboundEnvelope {
    /// Merges the flat and nested shapes into a single JSON object,
    /// with `payload` fields taking precedence over flat ones, per §4.2.
    pub fn merged_fields(&self) -> serde_json::Map<String, Value> {
        let mut merged = self.extra.clone();
        merged.remove("type");
        merged.remove("timestamp");
        merged.remove("msg_id");
        merged.remove("payload");
        if let Some(Value::Object(nested)) = &self.payload {
            for (k, v) in nested {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    /// Deserializes the merged field set into a concrete type.
    pub fn fields_as<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        let merged = Value::Object(self.merged_fields());
        serde_json::from_value(merged)
    }
}

// ---------------------------------------------------------------------------
// Envelope — outbound (flat)
// ---------------------------------------------------------------------------

/// An outbound frame. Serializes as `{"type": ..., ...fields}` with no
/// `payload` wrapper, per §6.1 — the one exception is `game_sync`, whose
/// `state` field nests the game snapshot object.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(flatten)]
    pub fields: Value,
}

impl OutboundEnvelope {
    /// Builds an outbound envelope from a type string and a serializable
    /// payload (usually a `serde_json::json!({...})` object).
    pub fn new(kind: impl Into<String>, fields: Value) -> Self {
        Self {
            kind: kind.into(),
            timestamp: None,
            fields,
        }
    }

    pub fn with_timestamp(mut self, ts: u64) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy (§6.1, §7)
// ---------------------------------------------------------------------------

/// Numeric application error codes carried in `error` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MalformedJson,
    MissingType,
    AuthRequired,
    UnknownType,
    InternalError,
}

impl ErrorCode {
    pub const fn code(self) -> u16 {
        match self {
            Self::MalformedJson => 4000,
            Self::MissingType => 4001,
            Self::AuthRequired => 4003,
            Self::UnknownType => 4004,
            Self::InternalError => 5000,
        }
    }
}

/// Transport-level close codes (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    ReplacedSession,
    ServerAtCapacity,
}

impl CloseCode {
    pub const fn code(self) -> u16 {
        match self {
            Self::ReplacedSession => 1001,
            Self::ServerAtCapacity => 1013,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
