//! Authoritative per-game rule engines for Aether Party (§4.4).
//!
//! Every game type is modeled as a tagged variant over one common
//! interface (§4.4.1, §9: "tagged variant over the common interface").
//! [`GameInstance`] is the enum; [`GameVariant`] is the trait it
//! delegates to. The room layer and the top-level server never match on
//! individual game types — they only ever call [`GameVariant`] methods.

mod config;
mod gomoku;
mod monopoly;
mod racing;
mod shooter2d;
mod variant;
mod werewolf;

pub use config::{GameTypeConfig, SyncMode, GAME_CONFIGS};
pub use variant::{ActionOutcome, GameInstance, GameResult, GameVariant, PlayerSnapshot};
