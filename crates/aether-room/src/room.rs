//! The `Room` / `RoomPlayer` membership model (§3).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use aether_protocol::{RoomId, UserId};

use crate::config::RoomState;

/// One seated member of a room (§3 `RoomPlayer`).
#[derive(Debug, Clone, Serialize)]
pub struct RoomPlayer {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar: String,
    pub host: bool,
    pub ready: bool,
    /// Smallest non-negative integer not already in use in this room.
    pub slot: usize,
    pub team: Option<u32>,
    pub score: i64,
}

/// A membership + state container for one game session (§3 `Room`).
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub display_name: String,
    pub game_type: String,
    pub min_players: usize,
    pub max_players: usize,
    pub private: bool,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub state: RoomState,
    pub players: Vec<RoomPlayer>,
    pub host: Option<UserId>,
    pub created_at: u64,
    pub started_at: Option<u64>,
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl Room {
    pub fn new(
        id: RoomId,
        display_name: String,
        game_type: String,
        min_players: usize,
        max_players: usize,
        private: bool,
        password: Option<String>,
    ) -> Self {
        Self {
            id,
            display_name,
            game_type,
            min_players,
            max_players,
            private,
            password,
            state: RoomState::Waiting,
            players: Vec::new(),
            host: None,
            created_at: now_unix(),
            started_at: None,
        }
    }

    pub fn player(&self, user: UserId) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| p.user_id == user)
    }

    pub fn player_mut(&mut self, user: UserId) -> Option<&mut RoomPlayer> {
        self.players.iter_mut().find(|p| p.user_id == user)
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.player(user).is_some()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// `can_start` ⇔ enough players AND every non-host player is ready (§4.5).
    pub fn can_start(&self) -> bool {
        self.players.len() >= self.min_players
            && self.players.iter().all(|p| p.host || p.ready)
    }

    fn next_free_slot(&self) -> usize {
        let mut used: Vec<usize> = self.players.iter().map(|p| p.slot).collect();
        used.sort_unstable();
        let mut slot = 0;
        for s in used {
            if s == slot {
                slot += 1;
            } else {
                break;
            }
        }
        slot
    }

    /// Seats a new player. The first player to join an empty room becomes
    /// host with `ready = true` (§4.5 `create`); later joiners start
    /// unready (§4.5 `join`).
    pub fn seat_player(&mut self, user_id: UserId, display_name: String, avatar: String) -> &RoomPlayer {
        let is_host = self.players.is_empty();
        let slot = self.next_free_slot();
        self.players.push(RoomPlayer {
            user_id,
            display_name,
            avatar,
            host: is_host,
            ready: is_host,
            slot,
            team: None,
            score: 0,
        });
        if is_host {
            self.host = Some(user_id);
        }
        self.players.last().unwrap()
    }

    /// Removes a player. If they were host and players remain, the
    /// earliest remaining player (by slot) is promoted (§3, §4.5 `leave`).
    pub fn remove_player(&mut self, user: UserId) -> bool {
        let Some(idx) = self.players.iter().position(|p| p.user_id == user) else {
            return false;
        };
        let was_host = self.players[idx].host;
        self.players.remove(idx);
        if was_host {
            self.host = None;
            if let Some(next) = self.players.iter_mut().min_by_key(|p| p.slot) {
                next.host = true;
                next.ready = true;
                self.host = Some(next.user_id);
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
