//! Unified error type for the Aether Party server.

use aether_protocol::ProtocolError;
use aether_room::RoomError;
use aether_session::SessionError;
use aether_transport::TransportError;

/// Top-level error that wraps every sub-crate's error type.
///
/// The router and connection handler deal with this single type instead
/// of importing errors from each sub-crate individually. The `#[from]`
/// attribute on each variant auto-generates a `From` impl, so `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum AetherError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, reconnect, expired).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),
}
