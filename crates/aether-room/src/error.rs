//! Error types for the room layer.

use aether_protocol::{RoomId, UserId};

/// Failures surfaced by [`crate::RoomManager`] operations (§4.5, §7).
///
/// Each variant maps to a taxonomy error code the caller attaches to an
/// outbound `*_response` envelope — never a free-form message.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("unknown game type: {0}")]
    UnknownGameType(String),

    #[error("room is full")]
    RoomFull,

    #[error("wrong password")]
    WrongPassword,

    #[error("user {0} is already a member of a room")]
    AlreadyInRoom(UserId),

    #[error("user {0} is not a member of room {1}")]
    NotInRoom(UserId, RoomId),

    #[error("room is not accepting joins in its current state")]
    NotJoinable,

    #[error("only the host may perform this action")]
    NotHost,

    #[error("room does not satisfy the conditions to start")]
    CannotStart,

    #[error("room is not in the expected state for this operation")]
    InvalidState,

    #[error("no game instance is bound to this room")]
    NoGameInstance,

    #[error("too many rooms are already open")]
    TooManyRooms,
}
