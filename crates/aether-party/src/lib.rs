//! # Aether Party
//!
//! Top-level coordination server for Aether Party: the gateway/message
//! router, auth integration, room and match orchestration, and chat,
//! wired together over the lower `aether-*` layers.
//!
//! ```text
//! aether-transport  → bytes on the wire
//! aether-protocol   → envelope shapes, error taxonomy
//! aether-session    → connection registry, auth, presence
//! aether-room       → room lifecycle + game-runtime orchestration
//! aether-party (this crate) → ties it all together behind one server
//! ```

mod chat;
mod config;
mod error;
mod handler;
mod match_service;
mod server;
mod state;

pub use config::ServerConfig;
pub use error::AetherError;
pub use server::AetherServer;
pub use state::ServerState;

pub mod prelude {
    pub use crate::{AetherError, AetherServer, ServerConfig, ServerState};
}
