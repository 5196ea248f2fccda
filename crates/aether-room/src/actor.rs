//! Room actor: an isolated Tokio task owning one room's membership,
//! lifecycle, and (while `playing`) its bound [`GameInstance`] (§4.5,
//! §4.4.2, §5 "Per-room serialization").
//!
//! Generalized from the teacher's single-game actor: this actor hosts
//! whichever of the five game kinds `room.game_type` names, dispatching
//! through [`GameVariant`] rather than a monomorphized `GameLogic`. All
//! commands and the room's own tick loop run through one `tokio::select!`
//! in [`RoomActor::run`], which is what gives the "at most one action or
//! tick mutates a room's game at any instant" guarantee (§5, §9) for
//! free — there's only ever one task touching this room's state.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use aether_games::{GameInstance, GameVariant, PlayerSnapshot, GAME_CONFIGS};
use aether_protocol::{OutboundEnvelope, RoomId, UserId};
use aether_tick::{TickConfig, TickScheduler};

use crate::effects::RoomEffect;
use crate::room::Room;
use crate::{RoomError, RoomState};

/// What a newly-seated player looks like to the room (§3 `RoomPlayer`
/// fields supplied at join time).
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar: String,
    pub password: Option<String>,
}

pub(crate) enum RoomCommand {
    Join {
        req: JoinRequest,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Player-initiated leave, or a disconnect while `waiting` — both
    /// follow the same "leave as if they called leave" path (§4.4.5).
    Leave {
        user: UserId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SetReady {
        user: UserId,
        ready: bool,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Start {
        user: UserId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    GameAction {
        user: UserId,
        action: String,
        data: Value,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// A session's transport died while its user was in this room. No
    /// reply — the caller doesn't block on disconnect cleanup (§4.4.5).
    Disconnect { user: UserId },
    GetSnapshot {
        reply: oneshot::Sender<Room>,
    },
    /// A user reconnecting into a room that's mid-game (§4.4.6): hands back
    /// enough of the bound game instance to replay `game_start` + private
    /// init without re-running `start`.
    GetReconnectInfo {
        user: UserId,
        reply: oneshot::Sender<Option<ReconnectInfo>>,
    },
    Shutdown,
}

/// What a reconnecting player needs to catch back up to a `playing` room
/// (§4.4.6): the full state snapshot plus their own private init, if any.
#[derive(Debug, Clone)]
pub struct ReconnectInfo {
    pub state: Value,
    pub private_init: Option<Value>,
}

/// Handle to a running room actor (cheap to clone — an `mpsc::Sender`).
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| RoomError::NotFound(self.room_id))?;
        rx.await.map_err(|_| RoomError::NotFound(self.room_id))
    }

    pub async fn join(&self, req: JoinRequest) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Join { req, reply }).await?
    }

    pub async fn leave(&self, user: UserId) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Leave { user, reply }).await?
    }

    pub async fn set_ready(&self, user: UserId, ready: bool) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::SetReady { user, ready, reply }).await?
    }

    pub async fn start(&self, user: UserId) -> Result<(), RoomError> {
        self.call(|reply| RoomCommand::Start { user, reply }).await?
    }

    pub async fn game_action(
        &self,
        user: UserId,
        action: impl Into<String>,
        data: Value,
    ) -> Result<(), RoomError> {
        let action = action.into();
        self.call(|reply| RoomCommand::GameAction { user, action, data, reply }).await?
    }

    /// Fire-and-forget: the caller (session cleanup) doesn't wait on this.
    pub fn disconnect(&self, user: UserId) {
        let _ = self.tx.try_send(RoomCommand::Disconnect { user });
    }

    pub async fn snapshot(&self) -> Result<Room, RoomError> {
        self.call(|reply| RoomCommand::GetSnapshot { reply }).await
    }

    pub async fn reconnect_info(&self, user: UserId) -> Result<Option<ReconnectInfo>, RoomError> {
        self.call(|reply| RoomCommand::GetReconnectInfo { user, reply }).await
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RoomCommand::Shutdown).await;
    }
}

const COMMAND_CHANNEL_SIZE: usize = 64;

pub(crate) fn spawn_room(
    room: Room,
    effects: mpsc::UnboundedSender<RoomEffect>,
) -> RoomHandle {
    let room_id = room.id;
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let actor = RoomActor {
        room,
        game: None,
        scheduler: None,
        effects,
        rx,
    };
    tokio::spawn(actor.run());
    RoomHandle { room_id, tx }
}

struct RoomActor {
    room: Room,
    game: Option<GameInstance>,
    scheduler: Option<TickScheduler>,
    effects: mpsc::UnboundedSender<RoomEffect>,
    rx: mpsc::Receiver<RoomCommand>,
}

/// Pends forever when there's no active tick scheduler, so it's safe to
/// hand to `tokio::select!` unconditionally.
async fn next_tick(scheduler: &mut Option<TickScheduler>) -> aether_tick::TickInfo {
    match scheduler {
        Some(s) => s.wait_for_tick().await,
        None => std::future::pending().await,
    }
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.id, "room actor started");
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                tick = next_tick(&mut self.scheduler) => {
                    self.handle_tick(tick.dt);
                }
            }
        }
        tracing::info!(room_id = %self.room.id, "room actor stopped");
    }

    /// Returns `true` if the actor should stop running.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join { req, reply } => {
                let _ = reply.send(self.handle_join(req));
            }
            RoomCommand::Leave { user, reply } => {
                let _ = reply.send(self.handle_leave(user));
            }
            RoomCommand::SetReady { user, ready, reply } => {
                let _ = reply.send(self.handle_set_ready(user, ready));
            }
            RoomCommand::Start { user, reply } => {
                let _ = reply.send(self.handle_start(user));
            }
            RoomCommand::GameAction { user, action, data, reply } => {
                let _ = reply.send(self.handle_game_action(user, &action, &data));
            }
            RoomCommand::Disconnect { user } => {
                self.handle_disconnect(user);
            }
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.room.clone());
            }
            RoomCommand::GetReconnectInfo { user, reply } => {
                let _ = reply.send(self.handle_reconnect_info(user));
            }
            RoomCommand::Shutdown => return true,
        }
        self.room.state == RoomState::Closed
    }

    fn emit(&self, effect: RoomEffect) {
        let _ = self.effects.send(effect);
    }

    fn room_update(&self, action: &str) {
        self.emit(RoomEffect::to_room(
            self.room.id,
            OutboundEnvelope::new(
                "room_update",
                serde_json::json!({
                    "action": action,
                    "room": self.room,
                    "players": self.room.players,
                }),
            ),
        ));
    }

    fn handle_join(&mut self, req: JoinRequest) -> Result<(), RoomError> {
        if self.room.is_member(req.user_id) {
            return Err(RoomError::AlreadyInRoom(req.user_id));
        }
        if !self.room.state.is_joinable() {
            return Err(RoomError::NotJoinable);
        }
        if self.room.is_full() {
            return Err(RoomError::RoomFull);
        }
        if self.room.private {
            if self.room.password.as_deref() != req.password.as_deref() {
                return Err(RoomError::WrongPassword);
            }
        }
        self.room.seat_player(req.user_id, req.display_name, req.avatar);
        self.room_update("player_joined");
        Ok(())
    }

    fn handle_leave(&mut self, user: UserId) -> Result<(), RoomError> {
        if !self.room.is_member(user) {
            return Err(RoomError::NotInRoom(user, self.room.id));
        }
        if self.room.state == RoomState::Playing {
            // Leaving mid-game is a forfeit, routed through the game path
            // so there's exactly one forfeit/end-game path (§4.4.5, §8).
            self.handle_disconnect(user);
            return Ok(());
        }
        self.room.remove_player(user);
        if self.room.is_empty() {
            self.room.state = RoomState::Closed;
            self.room_update("room_closed");
        } else {
            self.room_update("player_left");
        }
        Ok(())
    }

    fn handle_set_ready(&mut self, user: UserId, ready: bool) -> Result<(), RoomError> {
        if self.room.state != RoomState::Waiting {
            return Err(RoomError::InvalidState);
        }
        let player = self.room.player_mut(user).ok_or(RoomError::NotInRoom(user, self.room.id))?;
        if player.host {
            // No-op for host (§4.5 `set_ready`).
            return Ok(());
        }
        player.ready = ready;
        self.room_update("player_ready");
        Ok(())
    }

    fn handle_start(&mut self, user: UserId) -> Result<(), RoomError> {
        if self.room.state != RoomState::Waiting {
            return Err(RoomError::InvalidState);
        }
        if self.room.host != Some(user) {
            return Err(RoomError::NotHost);
        }
        if !self.room.can_start() {
            return Err(RoomError::CannotStart);
        }
        self.room.state = RoomState::Starting;
        self.room_update("game_starting");

        let snapshots: Vec<PlayerSnapshot> = self
            .room
            .players
            .iter()
            .map(|p| PlayerSnapshot { user_id: p.user_id, display_name: p.display_name.clone() })
            .collect();

        let Some(mut game) = GameInstance::new(&self.room.game_type, &snapshots) else {
            self.room.state = RoomState::Closed;
            self.room_update("room_closed");
            return Err(RoomError::UnknownGameType(self.room.game_type.clone()));
        };

        let init = game.init_game();
        self.emit(RoomEffect::to_room(self.room.id, OutboundEnvelope::new("game_start", init)));
        for player in &self.room.players {
            if let Some(private) = game.get_private_init(player.user_id) {
                self.emit(RoomEffect::to_user(
                    player.user_id,
                    OutboundEnvelope::new("game_start", private),
                ));
            }
        }

        if let Some(cfg) = GAME_CONFIGS.iter().find(|c| c.game_type == self.room.game_type) {
            let rate = cfg.effective_tick_rate();
            if rate > 0 {
                self.scheduler = Some(TickScheduler::new(TickConfig::with_rate(rate)));
            }
        }

        self.room.state = RoomState::Playing;
        self.room.started_at = Some(now_unix());
        self.game = Some(game);
        Ok(())
    }

    fn handle_game_action(&mut self, user: UserId, action: &str, data: &Value) -> Result<(), RoomError> {
        if self.room.state != RoomState::Playing {
            return Err(RoomError::InvalidState);
        }
        if !self.room.is_member(user) {
            return Err(RoomError::NotInRoom(user, self.room.id));
        }
        let Some(game) = self.game.as_mut() else {
            return Err(RoomError::NoGameInstance);
        };
        let outcome = game.process_action(user, action, data);

        // Private reply before broadcast, same transport (§5 ordering).
        if let Some(private) = outcome.private_reply {
            self.emit(RoomEffect::to_user(
                user,
                OutboundEnvelope::new("game_action_response", private),
            ));
        }
        if let Some(broadcast) = outcome.broadcast {
            self.emit(RoomEffect::to_room(
                self.room.id,
                envelope_from_game_payload(broadcast, "game_action"),
            ));
        }

        if self.game.as_ref().map(|g| g.is_finished()).unwrap_or(false) {
            self.finish_game();
        }
        Ok(())
    }

    fn handle_tick(&mut self, dt: Duration) {
        let Some(game) = self.game.as_mut() else {
            self.scheduler = None;
            return;
        };
        game.update(dt);
        let frame_id = game.frame_id();
        let state = game.get_state();
        self.emit(RoomEffect::to_room(
            self.room.id,
            OutboundEnvelope::new("game_sync", serde_json::json!({"frame_id": frame_id, "state": state})),
        ));
        if game.is_finished() {
            self.finish_game();
        }
    }

    /// Reconnect support (§4.4.6): only meaningful while `playing` and a
    /// game instance is bound — `None` otherwise, which the caller reads
    /// as "nothing to replay, `room_resume` alone is enough."
    fn handle_reconnect_info(&self, user: UserId) -> Option<ReconnectInfo> {
        let game = self.game.as_ref()?;
        Some(ReconnectInfo {
            state: game.get_state(),
            private_init: game.get_private_init(user),
        })
    }

    /// Disconnect mid-waiting (leave-as-if) vs mid-playing (forfeit path,
    /// §4.4.5). Idempotent against a user who has already left.
    fn handle_disconnect(&mut self, user: UserId) {
        if !self.room.is_member(user) {
            return;
        }
        if self.room.state != RoomState::Playing {
            self.room.remove_player(user);
            if self.room.is_empty() {
                self.room.state = RoomState::Closed;
                self.room_update("room_closed");
            } else {
                self.room_update("player_left");
            }
            return;
        }
        let Some(game) = self.game.as_mut() else { return };
        if let Some(envelope_value) = game.handle_disconnect(user) {
            let envelope = envelope_from_disconnect_payload(envelope_value);
            self.emit(RoomEffect::to_room(self.room.id, envelope));
        }
        if game.is_finished() {
            self.finish_game();
        }
    }

    /// End-of-game bookkeeping (§4.4.4): cancel the tick task, broadcast
    /// `game_end`, return the room to `waiting`, reset readiness, and
    /// hand the persistent side effects to the caller via [`RoomEffect::GameEnded`].
    fn finish_game(&mut self) {
        self.scheduler = None;
        let Some(game) = self.game.take() else { return };
        let Some(result) = game.check_game_over() else { return };
        let for_envelope = result.clone();

        self.emit(RoomEffect::to_room(
            self.room.id,
            OutboundEnvelope::new(
                "game_end",
                serde_json::json!({
                    "winner": for_envelope.winner,
                    "scores": for_envelope.scores,
                    "stats": for_envelope.stats,
                }),
            ),
        ));

        self.room.state = RoomState::Waiting;
        self.room.started_at = None;
        for player in &mut self.room.players {
            player.ready = player.host;
        }
        self.room_update("game_ended");
        self.emit(RoomEffect::GameEnded { room_id: self.room.id, result });
    }
}

/// Tags a raw game-variant payload with its envelope `type`, unless the
/// payload already carries one (§4.4.5: "if the disconnect envelope...
/// does not carry a `type`, the runtime wraps it").
fn envelope_from_game_payload(mut payload: Value, default_type: &str) -> OutboundEnvelope {
    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default_type.to_string());
    if let Value::Object(map) = &mut payload {
        map.remove("type");
    }
    OutboundEnvelope::new(kind, payload)
}

/// Disconnect-specific wrapping (§4.4.5): a payload with no `type` is
/// wrapped as `{type: game_action, action: player_disconnected, ...}`.
fn envelope_from_disconnect_payload(mut payload: Value) -> OutboundEnvelope {
    if payload.get("type").and_then(Value::as_str).is_some() {
        return envelope_from_game_payload(payload, "game_action");
    }
    if let Value::Object(map) = &mut payload {
        map.insert("action".to_string(), Value::String("player_disconnected".to_string()));
    }
    OutboundEnvelope::new("game_action", payload)
}

fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
