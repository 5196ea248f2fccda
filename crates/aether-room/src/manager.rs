//! Room manager: creates, tracks, and routes to room actors (§4.5, §4.6
//! "auto-room creation" reuses [`RoomManager::create`] verbatim).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use aether_games::GAME_CONFIGS;
use aether_protocol::{RoomId, UserId};

use crate::actor::{spawn_room, JoinRequest, RoomHandle};
use crate::effects::RoomEffect;
use crate::room::Room;
use crate::{RoomError, RoomState};

static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Parameters for [`RoomManager::create`] (§4.5 `create`).
pub struct CreateRoom {
    pub host: UserId,
    pub host_display_name: String,
    pub host_avatar: String,
    pub game_type: String,
    pub display_name: String,
    pub max_players: usize,
    pub private: bool,
    pub password: Option<String>,
}

/// Tracks every active room and which room each user currently belongs
/// to — "a user belongs to at most one room at any time" (§3) is
/// enforced here, one level above the per-room actors.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomHandle>,
    user_rooms: HashMap<UserId, RoomId>,
    max_rooms: usize,
    effects: mpsc::UnboundedSender<RoomEffect>,
}

impl RoomManager {
    pub fn new(max_rooms: usize, effects: mpsc::UnboundedSender<RoomEffect>) -> Self {
        Self {
            rooms: HashMap::new(),
            user_rooms: HashMap::new(),
            max_rooms,
            effects,
        }
    }

    /// Creates a room and seats the creator as host (§4.5 `create`).
    /// `max_players` is clamped into the game type's `[min, max]` (§8
    /// boundary behavior); unknown game types are rejected up front so
    /// `start` can never fail on that account later.
    pub async fn create(&mut self, req: CreateRoom) -> Result<RoomId, RoomError> {
        if self.user_rooms.contains_key(&req.host) {
            return Err(RoomError::AlreadyInRoom(req.host));
        }
        let config = GAME_CONFIGS
            .iter()
            .find(|c| c.game_type == req.game_type)
            .ok_or_else(|| RoomError::UnknownGameType(req.game_type.clone()))?;
        if self.rooms.len() >= self.max_rooms {
            return Err(RoomError::TooManyRooms);
        }

        let max_players = req.max_players.clamp(config.min_players, config.max_players);
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let room = Room::new(
            room_id,
            req.display_name,
            req.game_type,
            config.min_players,
            max_players,
            req.private,
            req.password.clone(),
        );
        let handle = spawn_room(room, self.effects.clone());
        handle
            .join(JoinRequest {
                user_id: req.host,
                display_name: req.host_display_name,
                avatar: req.host_avatar,
                password: req.password,
            })
            .await?;
        self.rooms.insert(room_id, handle);
        self.user_rooms.insert(req.host, room_id);
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        Ok(room_id)
    }

    fn handle(&self, room_id: RoomId) -> Result<&RoomHandle, RoomError> {
        self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))
    }

    /// (§4.5 `join`): rejects if the user is already in a room, even a
    /// different one (§3 invariant: at most one room per user).
    pub async fn join(
        &mut self,
        room_id: RoomId,
        user: UserId,
        display_name: String,
        avatar: String,
        password: Option<String>,
    ) -> Result<(), RoomError> {
        if self.user_rooms.contains_key(&user) {
            return Err(RoomError::AlreadyInRoom(user));
        }
        let handle = self.handle(room_id)?;
        handle
            .join(JoinRequest { user_id: user, display_name, avatar, password })
            .await?;
        self.user_rooms.insert(user, room_id);
        Ok(())
    }

    /// (§4.5 `leave`): also the path used for "user left while waiting"
    /// on disconnect (§4.4.5).
    pub async fn leave(&mut self, user: UserId) -> Result<RoomId, RoomError> {
        let room_id = *self.user_rooms.get(&user).ok_or(RoomError::NotInRoom(user, RoomId(0)))?;
        let handle = self.handle(room_id)?;
        handle.leave(user).await?;
        self.user_rooms.remove(&user);
        self.reap_if_closed(room_id).await;
        Ok(room_id)
    }

    pub async fn set_ready(&self, user: UserId, ready: bool) -> Result<RoomId, RoomError> {
        let room_id = self.room_of(user)?;
        self.handle(room_id)?.set_ready(user, ready).await?;
        Ok(room_id)
    }

    pub async fn start(&self, user: UserId) -> Result<RoomId, RoomError> {
        let room_id = self.room_of(user)?;
        self.handle(room_id)?.start(user).await?;
        Ok(room_id)
    }

    pub async fn game_action(
        &self,
        user: UserId,
        action: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<RoomId, RoomError> {
        let room_id = self.room_of(user)?;
        self.handle(room_id)?.game_action(user, action, data).await?;
        Ok(room_id)
    }

    /// Transport loss for a user currently seated in a room (§4.4.5).
    /// Fire-and-forget against the room actor; the manager's own
    /// bookkeeping (user→room map) is cleared immediately since the
    /// actor's reply isn't awaited.
    pub fn disconnect(&mut self, user: UserId) -> Option<RoomId> {
        let room_id = self.user_rooms.remove(&user)?;
        if let Some(handle) = self.rooms.get(&room_id) {
            handle.disconnect(user);
        }
        Some(room_id)
    }

    pub fn room_of(&self, user: UserId) -> Result<RoomId, RoomError> {
        self.user_rooms.get(&user).copied().ok_or(RoomError::NotInRoom(user, RoomId(0)))
    }

    pub async fn snapshot(&self, room_id: RoomId) -> Result<Room, RoomError> {
        self.handle(room_id)?.snapshot().await
    }

    /// Reconnect support (§4.4.6): resolves the user's current room, then
    /// asks its actor for a replay of the bound game's state + private init.
    pub async fn reconnect_info(&self, user: UserId) -> Result<Option<crate::actor::ReconnectInfo>, RoomError> {
        let room_id = self.room_of(user)?;
        self.handle(room_id)?.reconnect_info(user).await
    }

    /// Public room listing (§4.5, §6.1 `room_list`): only rooms still
    /// accepting joins, optionally filtered by game type.
    pub async fn list(&self, game_type: Option<&str>) -> Vec<Room> {
        let mut rooms = Vec::new();
        for handle in self.rooms.values() {
            if let Ok(room) = handle.snapshot().await {
                if room.state.is_joinable() && game_type.map(|g| g == room.game_type).unwrap_or(true) {
                    rooms.push(room);
                }
            }
        }
        rooms
    }

    /// Removes and shuts down a room that transitioned to `closed`.
    async fn reap_if_closed(&mut self, room_id: RoomId) {
        let Some(handle) = self.rooms.get(&room_id) else { return };
        let Ok(room) = handle.snapshot().await else { return };
        if room.state == RoomState::Closed {
            handle.shutdown().await;
            self.rooms.remove(&room_id);
            tracing::info!(%room_id, "room reaped");
        }
    }

    /// Idle-room reaper (§6.2 `room_idle_timeout`): closes and drops any
    /// `waiting` room that has sat empty for longer than `idle_timeout`,
    /// called from the periodic coalescer-style tick so the declared
    /// config knob has an observable effect.
    pub async fn reap_idle(&mut self, idle_timeout_secs: u64, now: u64) -> Vec<RoomId> {
        let mut reaped = Vec::new();
        let candidates: Vec<RoomId> = self.rooms.keys().copied().collect();
        for room_id in candidates {
            let Some(handle) = self.rooms.get(&room_id) else { continue };
            let Ok(room) = handle.snapshot().await else { continue };
            if room.state == RoomState::Waiting
                && room.players.is_empty()
                && now.saturating_sub(room.created_at) >= idle_timeout_secs
            {
                handle.shutdown().await;
                self.rooms.remove(&room_id);
                tracing::info!(%room_id, "idle room reaped");
                reaped.push(room_id);
            }
        }
        reaped
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_req(host: UserId) -> CreateRoom {
        CreateRoom {
            host,
            host_display_name: "alice".into(),
            host_avatar: "a".into(),
            game_type: "gomoku".into(),
            display_name: "alice's room".into(),
            max_players: 2,
            private: false,
            password: None,
        }
    }

    fn manager() -> (RoomManager, mpsc::UnboundedReceiver<RoomEffect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RoomManager::new(100, tx), rx)
    }

    #[tokio::test]
    async fn test_create_seats_host() {
        let (mut mgr, _rx) = manager();
        let room_id = mgr.create(create_req(UserId(1))).await.unwrap();
        let room = mgr.snapshot(room_id).await.unwrap();
        assert_eq!(room.host, Some(UserId(1)));
        assert_eq!(room.players.len(), 1);
    }

    #[tokio::test]
    async fn test_create_clamps_max_players_out_of_range() {
        let (mut mgr, _rx) = manager();
        let mut req = create_req(UserId(1));
        req.max_players = 99;
        let room_id = mgr.create(req).await.unwrap();
        let room = mgr.snapshot(room_id).await.unwrap();
        assert_eq!(room.max_players, 2); // gomoku's max is 2
    }

    #[tokio::test]
    async fn test_user_cannot_join_two_rooms() {
        let (mut mgr, _rx) = manager();
        mgr.create(create_req(UserId(1))).await.unwrap();
        let err = mgr.create(create_req(UserId(1))).await.unwrap_err();
        assert!(matches!(err, RoomError::AlreadyInRoom(_)));
    }

    #[tokio::test]
    async fn test_leave_empty_room_closes_it() {
        let (mut mgr, _rx) = manager();
        mgr.create(create_req(UserId(1))).await.unwrap();
        mgr.leave(UserId(1)).await.unwrap();
        assert!(mgr.room_of(UserId(1)).is_err());
    }

    #[tokio::test]
    async fn test_unknown_game_type_rejected() {
        let (mut mgr, _rx) = manager();
        let mut req = create_req(UserId(1));
        req.game_type = "chess".into();
        let err = mgr.create(req).await.unwrap_err();
        assert!(matches!(err, RoomError::UnknownGameType(_)));
    }

    #[tokio::test]
    async fn test_reap_idle_closes_empty_waiting_room() {
        let (mut mgr, _rx) = manager();
        let room = Room::new(RoomId(42), "empty".into(), "gomoku".into(), 2, 2, false, None);
        let handle = spawn_room(room, mgr.effects.clone());
        mgr.rooms.insert(RoomId(42), handle);

        let reaped = mgr.reap_idle(0, u64::MAX).await;

        assert_eq!(reaped, vec![RoomId(42)]);
        assert_eq!(mgr.room_count(), 0);
    }

    #[tokio::test]
    async fn test_reap_idle_leaves_occupied_room_alone() {
        let (mut mgr, _rx) = manager();
        mgr.create(create_req(UserId(1))).await.unwrap();

        let reaped = mgr.reap_idle(0, u64::MAX).await;

        assert!(reaped.is_empty());
        assert_eq!(mgr.room_count(), 1);
    }
}
