//! Shared server state handed to every connection handler task (§2).

use tokio::sync::{mpsc, Mutex};

use aether_room::{RoomEffect, RoomManager};
use aether_session::{AuthService, ConnectionRegistry};

use crate::chat::ChatService;
use crate::config::ServerConfig;
use crate::match_service::MatchService;

/// Everything a connection handler or background task needs, wrapped in
/// an `Arc` so it's cheap to hand to each spawned task (teacher's
/// `ServerState` pattern, generalized off one game type).
pub struct ServerState {
    pub config: ServerConfig,
    pub registry: Mutex<ConnectionRegistry>,
    pub auth: AuthService,
    pub rooms: Mutex<RoomManager>,
    pub match_service: Mutex<MatchService>,
    pub chat: Mutex<ChatService>,
}

impl ServerState {
    /// Builds the state plus the room-effect receiver the caller spawns
    /// a drain task over (kept out of the struct since it has exactly one
    /// consumer, unlike everything else here).
    pub fn new(config: ServerConfig) -> (Self, mpsc::UnboundedReceiver<RoomEffect>) {
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let state = Self {
            registry: Mutex::new(ConnectionRegistry::new(config.max_connections)),
            auth: AuthService::new(config.jwt_secret.clone()),
            rooms: Mutex::new(RoomManager::new(config.max_rooms, effects_tx)),
            match_service: Mutex::new(MatchService::new()),
            chat: Mutex::new(ChatService::new()),
            config,
        };
        (state, effects_rx)
    }
}

pub fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
