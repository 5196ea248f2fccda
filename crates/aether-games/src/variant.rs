//! The common game interface (§4.4.1) and its tagged-variant dispatch.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use aether_protocol::UserId;

use crate::gomoku::GomokuGame;
use crate::monopoly::MonopolyGame;
use crate::racing::RacingGame;
use crate::shooter2d::Shooter2dGame;
use crate::werewolf::WerewolfGame;

/// A membership snapshot handed to a game instance at construction time.
/// Game instances never see the live [`Room`](aether_room::Room) — only
/// this read-only copy (§3: "they never mutate Room state directly").
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub user_id: UserId,
    pub display_name: String,
}

/// The result of [`GameVariant::process_action`] (§4.4.1).
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub accepted: bool,
    /// Sent only to the acting user.
    pub private_reply: Option<Value>,
    /// Sent to every session in the room.
    pub broadcast: Option<Value>,
}

impl ActionOutcome {
    /// A rejected action: `{success: false, error: <kind>}` to the caller
    /// only, no broadcast (§7: validation errors never broadcast).
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            private_reply: Some(serde_json::json!({
                "success": false,
                "error": error.into(),
            })),
            broadcast: None,
        }
    }

    /// An accepted action with no further reply beyond `{success: true}`
    /// and no broadcast.
    pub fn accepted_silent() -> Self {
        Self {
            accepted: true,
            private_reply: Some(serde_json::json!({"success": true})),
            broadcast: None,
        }
    }

    /// An accepted action broadcast to the room, with `{success: true}`
    /// acknowledged to the caller.
    pub fn accepted_broadcast(broadcast: Value) -> Self {
        Self {
            accepted: true,
            private_reply: Some(serde_json::json!({"success": true})),
            broadcast: Some(broadcast),
        }
    }

    /// An accepted action with a private reply only (e.g. the seer's
    /// check result) and no broadcast.
    pub fn accepted_private(private_reply: Value) -> Self {
        Self {
            accepted: true,
            private_reply: Some(private_reply),
            broadcast: None,
        }
    }
}

/// End-of-game result (§3 `check_game_over`).
#[derive(Debug, Clone)]
pub struct GameResult {
    pub winner: Option<UserId>,
    pub scores: HashMap<UserId, i64>,
    pub stats: Value,
}

/// The common interface every game variant implements (§4.4.1).
///
/// Methods mirror the original's `GameLogic` base class 1:1 so the
/// grounding in `original_source/server/games/base.py` stays legible.
pub trait GameVariant {
    /// Broadcast at game start (§4.4.2 step 3).
    fn init_game(&mut self) -> Value;

    /// Per-player private state, sent only to that user (§4.4.2 step 4).
    /// Most variants have none.
    fn get_private_init(&self, _user: UserId) -> Option<Value> {
        None
    }

    /// Processes one client action frame (§4.4.2 "Action dispatch").
    fn process_action(&mut self, user: UserId, action: &str, data: &Value) -> ActionOutcome;

    /// Advances tick-driven games. No-op for event-driven ones.
    fn update(&mut self, _dt: Duration) {}

    /// Full snapshot for reconnect and periodic `game_sync` (§4.4.1).
    fn get_state(&self) -> Value;

    /// `Some` once [`Self::is_finished`] is true.
    fn check_game_over(&self) -> Option<GameResult>;

    /// Handles a disconnect mid-game (§4.4.5). May set `is_finished`.
    fn handle_disconnect(&mut self, user: UserId) -> Option<Value>;

    fn is_finished(&self) -> bool;

    fn frame_id(&self) -> u64;
}

/// Converts a [`UserId`] into the plain numeric string used as a JSON
/// object key throughout the game variants (player maps, score tables).
pub(crate) fn uid_key(user: UserId) -> String {
    user.0.to_string()
}

/// A tagged variant over the five shipped game types (§9: "Games should
/// be modeled as a tagged variant over the common interface").
pub enum GameInstance {
    Gomoku(GomokuGame),
    Monopoly(MonopolyGame),
    Werewolf(WerewolfGame),
    Shooter2d(Shooter2dGame),
    Racing(RacingGame),
}

impl GameInstance {
    /// Constructs the variant for `game_type`, or `None` if unknown
    /// (§4.4.2 step 1: "fails the transition if unknown").
    pub fn new(game_type: &str, players: &[PlayerSnapshot]) -> Option<Self> {
        match game_type {
            "gomoku" => Some(Self::Gomoku(GomokuGame::new(players))),
            "monopoly" => Some(Self::Monopoly(MonopolyGame::new(players))),
            "werewolf" => Some(Self::Werewolf(WerewolfGame::new(players))),
            "shooter2d" => Some(Self::Shooter2d(Shooter2dGame::new(players))),
            "racing" => Some(Self::Racing(RacingGame::new(players))),
            _ => None,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Gomoku(g) => g.$method($($arg),*),
            Self::Monopoly(g) => g.$method($($arg),*),
            Self::Werewolf(g) => g.$method($($arg),*),
            Self::Shooter2d(g) => g.$method($($arg),*),
            Self::Racing(g) => g.$method($($arg),*),
        }
    };
}

impl GameVariant for GameInstance {
    fn init_game(&mut self) -> Value {
        dispatch!(self, init_game)
    }

    fn get_private_init(&self, user: UserId) -> Option<Value> {
        dispatch!(self, get_private_init, user)
    }

    fn process_action(&mut self, user: UserId, action: &str, data: &Value) -> ActionOutcome {
        dispatch!(self, process_action, user, action, data)
    }

    fn update(&mut self, dt: Duration) {
        dispatch!(self, update, dt)
    }

    fn get_state(&self) -> Value {
        dispatch!(self, get_state)
    }

    fn check_game_over(&self) -> Option<GameResult> {
        dispatch!(self, check_game_over)
    }

    fn handle_disconnect(&mut self, user: UserId) -> Option<Value> {
        dispatch!(self, handle_disconnect, user)
    }

    fn is_finished(&self) -> bool {
        dispatch!(self, is_finished)
    }

    fn frame_id(&self) -> u64 {
        dispatch!(self, frame_id)
    }
}
