//! Wire protocol for the Aether Party coordination core.
//!
//! This crate defines the "language" that clients and servers speak over
//! the bidirectional JSON transport (§6.1):
//!
//! - **Envelope** ([`InboundEnvelope`], [`OutboundEnvelope`]) — the
//!   top-level frame shape. Inbound frames accept both flat and
//!   `payload`-nested fields (§4.2); outbound frames always emit flat
//!   fields.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — converts envelopes
//!   to/from the bytes that cross the transport.
//! - **Errors** ([`ProtocolError`], [`ErrorCode`], [`CloseCode`]) — the
//!   numeric error/close code taxonomy from §6.1/§7.
//!
//! The protocol layer doesn't know about connections, rooms, or game
//! rules — it only knows how to parse and serialize frames.

mod codec;
mod error;
mod types;

pub use codec::Codec;
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    CloseCode, ErrorCode, InboundEnvelope, OutboundEnvelope, Recipient,
    RoomId, SessionId, UserId,
};
