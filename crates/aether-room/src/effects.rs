//! Outbound effects produced by a room actor (§2 "service emits zero or
//! more outbound envelopes routed via the connection registry").
//!
//! The room layer never touches a transport or the connection registry
//! directly — it has no dependency on `aether-session` at all. Instead
//! every mutation that needs to reach a client is queued as a
//! [`RoomEffect`] on a channel the caller (the top-level server) owns;
//! the caller drains it and forwards each effect to the connection
//! registry's `send_*` methods (§4.1, §5 "Shared-resource policy").

use aether_games::GameResult;
use aether_protocol::{OutboundEnvelope, Recipient, RoomId};

/// One outbound effect queued by a room actor.
#[derive(Debug)]
pub enum RoomEffect {
    /// Deliver `envelope` to `recipient`.
    Deliver {
        recipient: Recipient,
        envelope: OutboundEnvelope,
    },
    /// A game bound to `room_id` just finished (§4.4.4 step 5). The
    /// caller applies the persistent side effects against the user
    /// store — the room layer has no access to it.
    GameEnded { room_id: RoomId, result: GameResult },
}

impl RoomEffect {
    pub fn deliver(recipient: Recipient, envelope: OutboundEnvelope) -> Self {
        Self::Deliver { recipient, envelope }
    }

    pub fn to_user(user: aether_protocol::UserId, envelope: OutboundEnvelope) -> Self {
        Self::deliver(Recipient::User(user), envelope)
    }

    pub fn to_room(room_id: RoomId, envelope: OutboundEnvelope) -> Self {
        Self::deliver(Recipient::Room(room_id), envelope)
    }

    pub fn to_channel(channel: impl Into<String>, envelope: OutboundEnvelope) -> Self {
        Self::deliver(Recipient::Channel(channel.into()), envelope)
    }
}
