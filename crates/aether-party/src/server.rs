//! `AetherServer`: binds the transport, wires the background tasks, and
//! runs the accept loop. Ties together transport → protocol → session →
//! room, the way the teacher's server module ties its layers together.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use aether_protocol::{OutboundEnvelope, Recipient, RoomId, UserId};
use aether_room::RoomEffect;
use aether_session::UserStatus;
use aether_transport::{Transport, WebSocketTransport};

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::state::ServerState;
use crate::AetherError;

/// A running Aether Party coordination server.
pub struct AetherServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
    shutdown_tx: watch::Sender<bool>,
}

impl AetherServer {
    /// Binds the listening socket and spawns every background task
    /// (effects drain, connection reaper, match coalescer) before
    /// returning (§5 "owns background tasks").
    pub async fn bind(config: ServerConfig) -> Result<Self, AetherError> {
        let addr = config.bind_addr();
        let transport = WebSocketTransport::bind(&addr).await?;
        let (state, effects_rx) = ServerState::new(config);
        let state = Arc::new(state);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(drain_effects(Arc::clone(&state), effects_rx));
        tokio::spawn(run_reaper(Arc::clone(&state), shutdown_rx.clone()));
        tokio::spawn(run_match_coalescer(Arc::clone(&state), shutdown_rx.clone()));

        Ok(Self { transport, state, shutdown_tx })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Accepts connections until the transport errors out (§5 "parallel
    /// cooperative" scheduling — one task per connection).
    pub async fn run(&mut self) -> Result<(), AetherError> {
        tracing::info!(addr = ?self.local_addr(), "aether-party server running");
        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        handle_connection(conn, state).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    return Err(AetherError::Transport(e));
                }
            }
        }
    }

    /// Graceful shutdown (§5): cancels the periodic background tasks and
    /// sends a transport-level close to every live session.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let registry = self.state.registry.lock().await;
        for session_id in registry.session_ids() {
            registry.send_to_session(
                session_id,
                OutboundEnvelope::new("notification", serde_json::json!({"message": "server shutting down"})),
            );
        }
        tracing::info!("graceful shutdown initiated");
    }
}

/// Drains the room layer's effect channel for as long as any
/// [`aether_room::RoomHandle`] is alive; forwards each [`RoomEffect`] to
/// the connection registry and, for [`RoomEffect::GameEnded`], applies
/// the persistent side effects against the user store (§4.4.4 steps 4-5).
async fn drain_effects(state: Arc<ServerState>, mut effects_rx: mpsc::UnboundedReceiver<RoomEffect>) {
    while let Some(effect) = effects_rx.recv().await {
        match effect {
            RoomEffect::Deliver { recipient, envelope } => {
                // A `game_start` broadcast is the moment a room's players
                // actually start playing — bump their presence accordingly
                // before fanning the envelope out (§4.4.2 step 3).
                if envelope.kind == "game_start" {
                    if let Recipient::Room(room_id) = &recipient {
                        set_room_presence(&state, *room_id, UserStatus::InGame).await;
                    }
                }
                let registry = state.registry.lock().await;
                match recipient {
                    Recipient::User(user_id) => registry.send_to_user(user_id, envelope),
                    Recipient::Room(room_id) => registry.send_to_room(room_id, envelope),
                    Recipient::Channel(channel) => registry.send_to_channel(&channel, envelope),
                    Recipient::Broadcast => registry.broadcast(envelope),
                }
            }
            RoomEffect::GameEnded { room_id, result } => {
                for (&user_id, &score) in result.scores.iter() {
                    let won = result.winner == Some(user_id);
                    state.auth.apply_game_result(user_id, won, score.max(0) as u64).await;
                }
                // The room already reset to `waiting` by the time this
                // effect is emitted (§4.4.4 step 4) — reflect that in
                // every member's presence.
                set_room_presence(&state, room_id, UserStatus::InRoom).await;
                broadcast_room_list(&state).await;
            }
        }
    }
}

/// Sets every current member of `room_id`'s presence status (§3
/// `UserSession.status`) in one pass, used at the `playing`/`waiting`
/// transitions a room actor can't reach the registry to announce itself.
async fn set_room_presence(state: &Arc<ServerState>, room_id: RoomId, status: UserStatus) {
    let Ok(room) = state.rooms.lock().await.snapshot(room_id).await else { return };
    let mut registry = state.registry.lock().await;
    for player in &room.players {
        if let Some(session_id) = registry.session_of_user(player.user_id) {
            if let Some(user_session) = registry.user_session_mut(session_id) {
                user_session.status = status;
            }
        }
    }
}

/// Rebroadcasts the public room list to the lobby channel (§4.4.4 step 4).
async fn broadcast_room_list(state: &Arc<ServerState>) {
    let rooms = state.rooms.lock().await.list(None).await;
    let registry = state.registry.lock().await;
    registry.send_to_channel(
        "lobby",
        OutboundEnvelope::new("room_list", serde_json::json!({"rooms": rooms})),
    );
}

/// Connection reaper (§4.1 `reap`): closes sessions whose last heartbeat
/// exceeded `heartbeat_timeout`.
async fn run_reaper(state: Arc<ServerState>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(state.config.heartbeat_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let stale = {
                    let registry = state.registry.lock().await;
                    registry.stale_sessions(state.config.heartbeat_timeout)
                };
                for session_id in stale {
                    tracing::info!(%session_id, "reaping stale session");
                    let user_id = {
                        let mut registry = state.registry.lock().await;
                        let uid = registry.user_id_of(session_id);
                        registry.remove(session_id);
                        uid
                    };
                    if let Some(user_id) = user_id {
                        handle_room_disconnect(&state, user_id).await;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

/// Disconnect cleanup for a user whose transport is gone — shared by the
/// reaper and the per-connection handler's drop path (§4.4.5, §4.6).
pub(crate) async fn handle_room_disconnect(state: &Arc<ServerState>, user_id: UserId) {
    let room_id = state.rooms.lock().await.disconnect(user_id);
    if room_id.is_some() {
        broadcast_room_list(state).await;
    }
    state.match_service.lock().await.cancel_match(user_id);
}

/// Periodic matchmaking coalescer (§4.6); also carries the idle-room
/// reaper (§6.2 `room_idle_timeout`) on the same tick, since both are
/// "scan everything on a ~1s cadence" background passes.
async fn run_match_coalescer(state: Arc<ServerState>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(state.config.match_check_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let batches = state.match_service.lock().await.coalesce();
                for batch in batches {
                    create_match_room(&state, batch).await;
                }
                let expired = state.match_service.lock().await.expire_timeouts(state.config.match_timeout);
                {
                    let registry = state.registry.lock().await;
                    for req in expired {
                        registry.send_to_user(
                            req.user_id,
                            OutboundEnvelope::new("match_timeout", serde_json::json!({"game_type": req.game_type})),
                        );
                    }
                }
                let reaped = state
                    .rooms
                    .lock()
                    .await
                    .reap_idle(state.config.room_idle_timeout.as_secs(), crate::state::now_unix())
                    .await;
                if !reaped.is_empty() {
                    broadcast_room_list(&state).await;
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

async fn create_match_room(state: &Arc<ServerState>, batch: crate::match_service::MatchBatch) {
    use aether_room::{CreateRoom, RoomState};

    let Some(host_req) = batch.requests.first() else { return };
    let host = state.auth.user(host_req.user_id).await;
    let Some(host) = host else { return };

    let room_id = {
        let mut rooms = state.rooms.lock().await;
        rooms
            .create(CreateRoom {
                host: host.id,
                host_display_name: host.display_name.clone(),
                host_avatar: host.avatar.clone(),
                game_type: batch.game_type.clone(),
                display_name: format!("Match #{}", host.id.0),
                max_players: batch.requests.len(),
                private: false,
                password: None,
            })
            .await
    };
    let Ok(room_id) = room_id else { return };

    for req in batch.requests.iter().skip(1) {
        let Some(user) = state.auth.user(req.user_id).await else { continue };
        let mut rooms = state.rooms.lock().await;
        if rooms.join(room_id, user.id, user.display_name.clone(), user.avatar.clone(), None).await.is_ok() {
            let _ = rooms.set_ready(user.id, true).await;
        }
    }

    {
        let registry = state.registry.lock().await;
        for req in &batch.requests {
            registry.send_to_user(
                req.user_id,
                OutboundEnvelope::new(
                    "match_found",
                    serde_json::json!({
                        "room_id": room_id,
                        "game_type": batch.game_type,
                    }),
                ),
            );
        }
    }
    broadcast_room_list(state).await;

    let state = Arc::clone(state);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        let room = state.rooms.lock().await.snapshot(room_id).await.ok();
        let Some(room) = room else { return };
        if room.state == RoomState::Waiting && room.can_start() {
            if let Some(host_id) = room.host {
                let _ = state.rooms.lock().await.start(host_id).await;
            }
        }
    });
}
