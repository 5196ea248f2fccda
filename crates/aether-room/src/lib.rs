//! Room lifecycle management for Aether Party (§3, §4.5).
//!
//! Each room runs as an isolated Tokio task (actor model, reused from
//! the teacher) with its own membership, lifecycle state, and — while
//! `playing` — a bound [`aether_games::GameInstance`] plus an optional
//! tick loop (§4.4.2, §4.4.3). The room layer never touches a transport
//! or the connection registry directly: every client-visible effect is
//! queued as a [`RoomEffect`] for the caller to forward (§2, §5).

mod actor;
mod config;
mod effects;
mod error;
mod manager;
mod room;

pub use actor::{JoinRequest, ReconnectInfo, RoomHandle};
pub use config::RoomState;
pub use effects::RoomEffect;
pub use error::RoomError;
pub use manager::{CreateRoom, RoomManager};
pub use room::{Room, RoomPlayer};
