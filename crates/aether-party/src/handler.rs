//! Per-connection handler: registration, message routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The task `select!`s between two sources: the
//! transport's own `recv()` (inbound client frames) and the session's
//! mailbox (`ConnEvent`s pushed by other tasks via the connection
//! registry — broadcasts, the "replaced session" close, reaper closes).
//! This is what lets a session receive a `room_update` from another
//! player's action while it's itself idle on `recv()` (§4.1, §5).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use aether_protocol::{ErrorCode, InboundEnvelope, OutboundEnvelope, RoomId, SessionId, UserId};
use aether_room::RoomState;
use aether_session::{ConnEvent, UserSession, UserStatus};
use aether_transport::{Connection, WebSocketConnection};

use crate::server::handle_room_disconnect;
use crate::state::ServerState;

/// Types the router accepts without an authenticated session (§4.2).
const PUBLIC_TYPES: &[&str] = &["heartbeat", "login", "token_login", "register"];

/// Every type this router recognizes. Anything else is `4004` (§4.2).
const KNOWN_TYPES: &[&str] = &[
    "heartbeat",
    "login",
    "token_login",
    "register",
    "logout",
    "get_friends",
    "get_rooms",
    "create_room",
    "join_room",
    "leave_room",
    "set_ready",
    "start_game",
    "quick_match",
    "cancel_match",
    "game_action",
    "chat_message",
];

/// Disconnects the session's bookkeeping when the handler task ends, by
/// whichever path — clean close, transport error, or the registry closing
/// it out from under us. Mirrors the teacher's drop-guard pattern: `Drop`
/// is synchronous, so cleanup itself is handed off to a spawned task.
struct SessionGuard {
    session_id: SessionId,
    state: Arc<ServerState>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session_id = self.session_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            cleanup_session(&state, session_id).await;
        });
    }
}

/// Handles one connection end to end: register, select loop, implicit
/// cleanup via [`SessionGuard`] on return.
pub(crate) async fn handle_connection(conn: WebSocketConnection, state: Arc<ServerState>) {
    let (tx, mut mailbox) = mpsc::unbounded_channel::<ConnEvent>();
    let session_id = {
        let mut registry = state.registry.lock().await;
        match registry.register(tx) {
            Ok(id) => id,
            Err(aether_session::SessionError::AtCapacity(code)) => {
                let _ = conn.close_with_code(code, "server at capacity").await;
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "session registration failed unexpectedly");
                return;
            }
        }
    };
    let _guard = SessionGuard { session_id, state: Arc::clone(&state) };

    loop {
        tokio::select! {
            incoming = conn.recv() => {
                match incoming {
                    Ok(Some(data)) => {
                        state.registry.lock().await.touch_heartbeat(session_id);
                        if !process_frame(&conn, &state, session_id, &data).await {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(%session_id, error = %e, "recv error");
                        break;
                    }
                }
            }
            event = mailbox.recv() => {
                match event {
                    Some(ConnEvent::Send(envelope)) => send_envelope(&conn, &envelope).await,
                    Some(ConnEvent::Close { code, reason }) => {
                        let _ = conn.close_with_code(code, &reason).await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Parses and dispatches one inbound frame. Returns `false` when the
/// connection should close.
async fn process_frame(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    data: &[u8],
) -> bool {
    let envelope: InboundEnvelope = match serde_json::from_slice(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(%session_id, error = %e, "malformed inbound JSON");
            send_envelope(conn, &error_envelope(ErrorCode::MalformedJson, "malformed JSON")).await;
            return true;
        }
    };

    let Some(kind) = envelope.kind.clone() else {
        send_envelope(conn, &error_envelope(ErrorCode::MissingType, "missing `type` field")).await;
        return true;
    };

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        send_envelope(conn, &error_envelope(ErrorCode::UnknownType, format!("unknown type: {kind}"))).await;
        return true;
    }

    if !PUBLIC_TYPES.contains(&kind.as_str()) {
        let authenticated = state.registry.lock().await.is_authenticated(session_id);
        if !authenticated {
            send_envelope(conn, &error_envelope(ErrorCode::AuthRequired, "authentication required")).await;
            return true;
        }
    }

    dispatch(conn, state, session_id, &kind, &envelope).await;
    true
}

async fn dispatch(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    kind: &str,
    envelope: &InboundEnvelope,
) {
    match kind {
        "heartbeat" => handle_heartbeat(conn, state, session_id).await,
        "login" => handle_login(conn, state, session_id, envelope).await,
        "token_login" => handle_token_login(conn, state, session_id, envelope).await,
        "register" => handle_register(conn, state, envelope).await,
        "logout" => handle_logout(conn, state, session_id).await,
        "get_friends" => handle_get_friends(conn, state, session_id).await,
        "get_rooms" => handle_get_rooms(conn, state, envelope).await,
        "create_room" => handle_create_room(conn, state, session_id, envelope).await,
        "join_room" => handle_join_room(conn, state, session_id, envelope).await,
        "leave_room" => handle_leave_room(conn, state, session_id).await,
        "set_ready" => handle_set_ready(conn, state, session_id, envelope).await,
        "start_game" => handle_start_game(conn, state, session_id).await,
        "quick_match" => handle_quick_match(conn, state, session_id, envelope).await,
        "cancel_match" => handle_cancel_match(conn, state, session_id).await,
        "game_action" => handle_game_action(conn, state, session_id, envelope).await,
        "chat_message" => handle_chat_message(conn, state, session_id, envelope).await,
        _ => unreachable!("filtered by KNOWN_TYPES"),
    }
}

// ---------------------------------------------------------------------------
// Request shapes (§6.1 "selected types (inbound)")
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LoginRequest {
    name: String,
    password: String,
    #[serde(default)]
    client_version: Option<String>,
    #[serde(default)]
    platform: Option<String>,
}

#[derive(Deserialize)]
struct TokenLoginRequest {
    token: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    password: String,
    #[serde(default)]
    nickname: Option<String>,
}

#[derive(Deserialize, Default)]
struct GetRoomsRequest {
    #[serde(default)]
    game_type: Option<String>,
}

#[derive(Deserialize)]
struct CreateRoomRequest {
    game_type: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    max_players: Option<usize>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Deserialize)]
struct JoinRoomRequest {
    room_id: u64,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Deserialize)]
struct SetReadyRequest {
    ready: bool,
}

#[derive(Deserialize)]
struct QuickMatchRequest {
    game_type: String,
}

#[derive(Deserialize)]
struct GameActionRequest {
    action: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct ChatMessageRequest {
    channel: String,
    content: String,
}

// ---------------------------------------------------------------------------
// Public handlers
// ---------------------------------------------------------------------------

async fn handle_heartbeat(conn: &WebSocketConnection, _state: &Arc<ServerState>, _session_id: SessionId) {
    send_envelope(
        conn,
        &OutboundEnvelope::new("heartbeat_ack", serde_json::json!({"server_time": crate::state::now_unix()})),
    )
    .await;
}

async fn handle_login(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let req: LoginRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };

    match state.auth.login(&req.name, &req.password).await {
        Ok((user_id, token)) => {
            complete_login(
                conn,
                state,
                session_id,
                user_id,
                Some(token),
                req.client_version,
                req.platform,
                "login_response",
            )
            .await;
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("login_response", serde_json::json!({"success": false, "error": e.to_string()})),
            )
            .await;
        }
    }
}

async fn handle_token_login(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let req: TokenLoginRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };

    match state.auth.token_login(&req.token).await {
        Ok(user_id) => {
            complete_login(conn, state, session_id, user_id, None, None, None, "token_login_response").await;
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new(
                    "token_login_response",
                    serde_json::json!({"success": false, "error": e.to_string()}),
                ),
            )
            .await;
        }
    }
}

/// Shared tail of `login`/`token_login` success (§4.3, §4.4.6): binds the
/// session, subscribes `lobby`, replies, then resumes an in-progress room
/// if the user belongs to one.
async fn complete_login(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    user_id: UserId,
    token: Option<String>,
    client_version: Option<String>,
    client_platform: Option<String>,
    response_type: &str,
) {
    let Some(user) = state.auth.user(user_id).await else {
        return send_envelope(conn, &error_envelope(ErrorCode::InternalError, "user vanished after auth")).await;
    };

    let mut user_session = UserSession::new(user_id);
    user_session.client_version = client_version;
    user_session.client_platform = client_platform;

    {
        let mut registry = state.registry.lock().await;
        if registry.bind_user(session_id, user_id, user_session).is_err() {
            return;
        }
        registry.subscribe_channel(session_id, "lobby");
    }

    let mut response = user.profile_summary();
    if let Value::Object(map) = &mut response {
        map.insert("success".into(), Value::Bool(true));
        if let Some(token) = token {
            map.insert("token".into(), Value::String(token));
            map.insert("expires_in".into(), Value::Number((state.config.jwt_expire_hours * 3600).into()));
        }
    }
    send_envelope(conn, &OutboundEnvelope::new(response_type, response)).await;

    resume_room_if_any(conn, state, session_id, user_id).await;
}

/// §4.4.6: re-joins the session to its room's connection group and
/// replays `room_resume`, then (if `playing`) `game_start` with full
/// state before any private init — ordering the spec pins down exactly.
async fn resume_room_if_any(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    user_id: UserId,
) {
    let room_id = {
        let rooms = state.rooms.lock().await;
        match rooms.room_of(user_id) {
            Ok(id) => id,
            Err(_) => return,
        }
    };
    let Ok(room) = state.rooms.lock().await.snapshot(room_id).await else { return };

    state.registry.lock().await.join_room(session_id, room_id);
    let status = if room.state == RoomState::Playing { UserStatus::InGame } else { UserStatus::InRoom };
    if let Some(user_session) = state.registry.lock().await.user_session_mut(session_id) {
        user_session.status = status;
        user_session.current_room = Some(room_id);
        user_session.current_game = Some(room.game_type.clone());
    }

    send_envelope(
        conn,
        &OutboundEnvelope::new(
            "room_resume",
            serde_json::json!({
                "room_state": room.state,
                "room": room,
                "players": room.players,
            }),
        ),
    )
    .await;

    if room.state != RoomState::Playing {
        return;
    }
    let Ok(Some(info)) = state.rooms.lock().await.reconnect_info(user_id).await else { return };
    let mut state_payload = info.state;
    if let Value::Object(map) = &mut state_payload {
        map.insert("game_type".into(), Value::String(room.game_type.clone()));
    }
    send_envelope(conn, &OutboundEnvelope::new("game_start", state_payload)).await;
    if let Some(private) = info.private_init {
        send_envelope(conn, &OutboundEnvelope::new("game_start", private)).await;
    }
}

async fn handle_register(conn: &WebSocketConnection, state: &Arc<ServerState>, envelope: &InboundEnvelope) {
    let req: RegisterRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };
    match state.auth.register(&req.name, &req.password, req.nickname.as_deref()).await {
        Ok(user_id) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("register_response", serde_json::json!({"success": true, "user_id": user_id})),
            )
            .await;
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("register_response", serde_json::json!({"success": false, "error": e.to_string()})),
            )
            .await;
        }
    }
}

async fn handle_logout(conn: &WebSocketConnection, state: &Arc<ServerState>, session_id: SessionId) {
    let user_id = state.registry.lock().await.user_id_of(session_id);
    if let Some(user_id) = user_id {
        handle_room_disconnect(state, user_id).await;
    }
    state.registry.lock().await.unbind_user(session_id);
    send_envelope(conn, &OutboundEnvelope::new("logout_response", serde_json::json!({"success": true}))).await;
}

async fn handle_get_friends(conn: &WebSocketConnection, state: &Arc<ServerState>, session_id: SessionId) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let Some(user) = state.auth.user(user_id).await else { return };

    let mut friends = Vec::with_capacity(user.friends.len());
    for friend_id in &user.friends {
        let Some(friend) = state.auth.user(*friend_id).await else { continue };
        let registry = state.registry.lock().await;
        let status = registry
            .session_of_user(*friend_id)
            .and_then(|sid| registry.user_session(sid))
            .map(|s| s.status.as_str())
            .unwrap_or("offline");
        friends.push(serde_json::json!({
            "user_id": friend.id,
            "name": friend.name,
            "display_name": friend.display_name,
            "status": status,
        }));
    }
    send_envelope(conn, &OutboundEnvelope::new("friend_list", serde_json::json!({"friends": friends}))).await;
}

async fn handle_get_rooms(conn: &WebSocketConnection, state: &Arc<ServerState>, envelope: &InboundEnvelope) {
    let req: GetRoomsRequest = envelope.fields_as().unwrap_or_default();
    let rooms = state.rooms.lock().await.list(req.game_type.as_deref()).await;
    send_envelope(conn, &OutboundEnvelope::new("room_list", serde_json::json!({"rooms": rooms}))).await;
}

async fn handle_create_room(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let req: CreateRoomRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };
    let Some(host) = state.auth.user(user_id).await else { return };

    let result = state
        .rooms
        .lock()
        .await
        .create(aether_room::CreateRoom {
            host: user_id,
            host_display_name: host.display_name.clone(),
            host_avatar: host.avatar.clone(),
            game_type: req.game_type,
            display_name: req.display_name.unwrap_or_else(|| format!("{}'s room", host.display_name)),
            max_players: req.max_players.unwrap_or(2),
            private: req.private,
            password: req.password,
        })
        .await;

    match result {
        Ok(room_id) => {
            enter_room(state, session_id, user_id, room_id).await;
            let room = state.rooms.lock().await.snapshot(room_id).await.ok();
            send_envelope(
                conn,
                &OutboundEnvelope::new(
                    "create_room_response",
                    serde_json::json!({"success": true, "room_id": room_id, "room": room}),
                ),
            )
            .await;
            broadcast_room_list(state).await;
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("create_room_response", serde_json::json!({"success": false, "error": e.to_string()})),
            )
            .await;
        }
    }
}

async fn handle_join_room(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let req: JoinRoomRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };
    let Some(user) = state.auth.user(user_id).await else { return };
    let room_id = RoomId(req.room_id);

    let result = state
        .rooms
        .lock()
        .await
        .join(room_id, user_id, user.display_name.clone(), user.avatar.clone(), req.password)
        .await;

    match result {
        Ok(()) => {
            enter_room(state, session_id, user_id, room_id).await;
            let room = state.rooms.lock().await.snapshot(room_id).await.ok();
            send_envelope(
                conn,
                &OutboundEnvelope::new(
                    "join_room_response",
                    serde_json::json!({"success": true, "room_id": room_id, "room": room}),
                ),
            )
            .await;
            broadcast_room_list(state).await;
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("join_room_response", serde_json::json!({"success": false, "error": e.to_string()})),
            )
            .await;
        }
    }
}

async fn handle_leave_room(conn: &WebSocketConnection, state: &Arc<ServerState>, session_id: SessionId) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let result = state.rooms.lock().await.leave(user_id).await;
    match result {
        Ok(room_id) => {
            state.registry.lock().await.leave_room(session_id, room_id);
            if let Some(user_session) = state.registry.lock().await.user_session_mut(session_id) {
                user_session.status = UserStatus::Online;
                user_session.current_room = None;
                user_session.current_game = None;
            }
            send_envelope(conn, &OutboundEnvelope::new("leave_room_response", serde_json::json!({"success": true}))).await;
            broadcast_room_list(state).await;
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("leave_room_response", serde_json::json!({"success": false, "error": e.to_string()})),
            )
            .await;
        }
    }
}

async fn handle_set_ready(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let req: SetReadyRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };
    if let Err(e) = state.rooms.lock().await.set_ready(user_id, req.ready).await {
        send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await;
    }
}

async fn handle_start_game(conn: &WebSocketConnection, state: &Arc<ServerState>, session_id: SessionId) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    match state.rooms.lock().await.start(user_id).await {
        Ok(_) => {
            send_envelope(conn, &OutboundEnvelope::new("start_game_response", serde_json::json!({"success": true}))).await;
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("start_game_response", serde_json::json!({"success": false, "error": e.to_string()})),
            )
            .await;
        }
    }
}

async fn handle_quick_match(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let req: QuickMatchRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };
    let skill_rating = state.auth.user(user_id).await.map(|u| u.skill_rating).unwrap_or(1000);

    match state.match_service.lock().await.request_match(user_id, req.game_type, skill_rating) {
        Ok(queue_size) => {
            send_envelope(conn, &OutboundEnvelope::new("match_queued", serde_json::json!({"queue_size": queue_size}))).await;
        }
        Err(e) => {
            send_envelope(conn, &OutboundEnvelope::new("match_error", serde_json::json!({"error": e.to_string()}))).await;
        }
    }
}

async fn handle_cancel_match(conn: &WebSocketConnection, state: &Arc<ServerState>, session_id: SessionId) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let cancelled = state.match_service.lock().await.cancel_match(user_id);
    if cancelled {
        send_envelope(conn, &OutboundEnvelope::new("match_cancelled", serde_json::json!({}))).await;
    }
}

async fn handle_game_action(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let req: GameActionRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };
    if let Err(e) = state.rooms.lock().await.game_action(user_id, req.action, req.data).await {
        send_envelope(
            conn,
            &OutboundEnvelope::new("game_action_response", serde_json::json!({"success": false, "error": e.to_string()})),
        )
        .await;
    }
}

async fn handle_chat_message(
    conn: &WebSocketConnection,
    state: &Arc<ServerState>,
    session_id: SessionId,
    envelope: &InboundEnvelope,
) {
    let Some(user_id) = current_user(state, session_id).await else { return };
    let req: ChatMessageRequest = match envelope.fields_as() {
        Ok(r) => r,
        Err(e) => return send_envelope(conn, &error_envelope(ErrorCode::InternalError, e.to_string())).await,
    };
    let Some(user) = state.auth.user(user_id).await else { return };

    let result = state.chat.lock().await.send(
        user_id,
        user.display_name.clone(),
        req.channel.clone(),
        &req.content,
        crate::state::now_unix(),
    );

    match result {
        Ok(record) => {
            let envelope = OutboundEnvelope::new(
                "chat_message",
                serde_json::json!({
                    "channel": record.channel,
                    "sender_id": record.sender_id,
                    "sender_name": record.sender_name,
                    "content": record.content,
                    "timestamp": record.timestamp,
                }),
            );
            let registry = state.registry.lock().await;
            if let Some(id) = req.channel.strip_prefix("room_").and_then(|s| s.parse::<u64>().ok()) {
                registry.send_to_room(RoomId(id), envelope);
            } else {
                registry.send_to_channel(&req.channel, envelope);
            }
        }
        Err(e) => {
            send_envelope(
                conn,
                &OutboundEnvelope::new("chat_error", serde_json::json!({"code": e.kind(), "message": e.to_string()})),
            )
            .await;
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

async fn current_user(state: &Arc<ServerState>, session_id: SessionId) -> Option<UserId> {
    state.registry.lock().await.user_id_of(session_id)
}

/// Joins the room's connection group and sets presence, shared by
/// `create_room`/`join_room` (§4.5).
async fn enter_room(state: &Arc<ServerState>, session_id: SessionId, user_id: UserId, room_id: RoomId) {
    let mut registry = state.registry.lock().await;
    registry.join_room(session_id, room_id);
    if let Some(user_session) = registry.user_session_mut(session_id) {
        user_session.status = UserStatus::InRoom;
        user_session.current_room = Some(room_id);
    }
    let _ = user_id;
}

async fn broadcast_room_list(state: &Arc<ServerState>) {
    let rooms = state.rooms.lock().await.list(None).await;
    state.registry.lock().await.send_to_channel(
        "lobby",
        OutboundEnvelope::new("room_list", serde_json::json!({"rooms": rooms})),
    );
}

/// Disconnect cleanup shared by every path that ends a session: the
/// reaper, a normal `logout`, and this module's own [`SessionGuard`]
/// (§4.4.5, §4.6 "cancellation removes the user from all queues").
pub(crate) async fn cleanup_session(state: &Arc<ServerState>, session_id: SessionId) {
    let user_id = {
        let mut registry = state.registry.lock().await;
        let uid = registry.user_id_of(session_id);
        registry.remove(session_id);
        uid
    };
    if let Some(user_id) = user_id {
        handle_room_disconnect(state, user_id).await;
    }
}

fn error_envelope(code: ErrorCode, message: impl Into<String>) -> OutboundEnvelope {
    OutboundEnvelope::new("error", serde_json::json!({"code": code.code(), "message": message.into()}))
}

async fn send_envelope(conn: &WebSocketConnection, envelope: &OutboundEnvelope) {
    match serde_json::to_vec(envelope) {
        Ok(bytes) => {
            if let Err(e) = conn.send(&bytes).await {
                tracing::debug!(error = %e, "failed to write outbound envelope");
            }
        }
        Err(e) => tracing::error!(error = %e, "failed to encode outbound envelope"),
    }
}
