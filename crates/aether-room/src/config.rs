//! Room lifecycle state machine (§3, §4.5).

use serde::{Deserialize, Serialize};

/// The lifecycle state of a room.
///
/// Transitions form a DAG, not a strict chain (§3):
///
/// ```text
/// waiting → starting → playing → finished → closed
/// waiting → closed                          (emptied while waiting)
/// playing → waiting                         (game end, rematch-eligible)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    Waiting,
    Starting,
    Playing,
    Finished,
    Closed,
}

impl RoomState {
    /// Returns `true` if the room is accepting new joins.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if a bound game instance may be driven.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Playing)
    }

    /// Returns `true` if transitioning to `target` is one of the edges
    /// in the DAG described on [`RoomState`].
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::Starting)
                | (Self::Waiting, Self::Closed)
                | (Self::Starting, Self::Playing)
                | (Self::Starting, Self::Closed)
                | (Self::Playing, Self::Waiting)
                | (Self::Playing, Self::Finished)
                | (Self::Finished, Self::Closed)
        )
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Starting => "starting",
            Self::Playing => "playing",
            Self::Finished => "finished",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_can_go_to_starting_or_closed() {
        assert!(RoomState::Waiting.can_transition_to(RoomState::Starting));
        assert!(RoomState::Waiting.can_transition_to(RoomState::Closed));
        assert!(!RoomState::Waiting.can_transition_to(RoomState::Playing));
    }

    #[test]
    fn test_playing_can_return_to_waiting_for_rematch() {
        assert!(RoomState::Playing.can_transition_to(RoomState::Waiting));
    }

    #[test]
    fn test_finished_only_goes_to_closed() {
        assert!(RoomState::Finished.can_transition_to(RoomState::Closed));
        assert!(!RoomState::Finished.can_transition_to(RoomState::Waiting));
    }

    #[test]
    fn test_closed_is_terminal() {
        assert!(!RoomState::Closed.can_transition_to(RoomState::Waiting));
        assert!(!RoomState::Closed.can_transition_to(RoomState::Starting));
    }

    #[test]
    fn test_is_joinable_and_is_active() {
        assert!(RoomState::Waiting.is_joinable());
        assert!(!RoomState::Playing.is_joinable());
        assert!(RoomState::Starting.is_active());
        assert!(RoomState::Playing.is_active());
        assert!(!RoomState::Finished.is_active());
    }
}
