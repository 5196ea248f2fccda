//! The static per-game-type config table (§4.4.3, §6.2, SPEC_FULL §D).
//!
//! Ground truth: `original_source/server/config.py::GAME_CONFIGS`. This
//! is the only cross-instance coupling the runtime needs — room creation
//! clamps `max_players` against it, and the tick scheduler reads
//! `tick_rate`/`sync_mode` off it to decide whether to start a periodic
//! task at all.

/// How a game type keeps clients in sync (§4.4.3).
///
/// Only gates whether a tick task is started: `Frame` or a positive
/// `tick_rate` starts one, `Event` never does. `State` games (werewolf)
/// declare `tick_rate: 0` and so get no tick task either, matching the
/// original's `game_service.py`, which only ever calls `update()` from
/// the tick loop it starts for `tick_rate > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Event,
    Frame,
    State,
}

/// One row of the static game-type table.
#[derive(Debug, Clone, Copy)]
pub struct GameTypeConfig {
    pub game_type: &'static str,
    pub display_name: &'static str,
    pub min_players: usize,
    pub max_players: usize,
    /// Hz. 0 means no wire-level tick cadence (see [`SyncMode`]).
    pub tick_rate: u32,
    pub sync_mode: SyncMode,
}

impl GameTypeConfig {
    /// The tick rate to actually schedule. `Event` never ticks; `Frame`
    /// and `State` tick only at their declared `tick_rate` — `0` means
    /// no tick task at all (§4.4.3: "the mode currently influences only
    /// whether a tick task is started").
    pub fn effective_tick_rate(&self) -> u32 {
        match self.sync_mode {
            SyncMode::Event => 0,
            SyncMode::Frame | SyncMode::State => self.tick_rate,
        }
    }
}

/// The five game types this core ships rule engines for (SPEC_FULL §D).
pub const GAME_CONFIGS: &[GameTypeConfig] = &[
    GameTypeConfig {
        game_type: "gomoku",
        display_name: "Five in a Row",
        min_players: 2,
        max_players: 2,
        tick_rate: 0,
        sync_mode: SyncMode::Event,
    },
    GameTypeConfig {
        game_type: "monopoly",
        display_name: "Monopoly-like",
        min_players: 2,
        max_players: 4,
        tick_rate: 0,
        sync_mode: SyncMode::Event,
    },
    GameTypeConfig {
        game_type: "werewolf",
        display_name: "Werewolf",
        min_players: 6,
        max_players: 12,
        tick_rate: 0,
        sync_mode: SyncMode::State,
    },
    GameTypeConfig {
        game_type: "shooter2d",
        display_name: "2D Shooter",
        min_players: 2,
        max_players: 8,
        tick_rate: 20,
        sync_mode: SyncMode::Frame,
    },
    GameTypeConfig {
        game_type: "racing",
        display_name: "Racing",
        min_players: 2,
        max_players: 6,
        tick_rate: 30,
        sync_mode: SyncMode::Frame,
    },
];

/// Looks up a game type's config row by name.
pub fn lookup(game_type: &str) -> Option<&'static GameTypeConfig> {
    GAME_CONFIGS.iter().find(|c| c.game_type == game_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_game_type() {
        let cfg = lookup("gomoku").unwrap();
        assert_eq!(cfg.min_players, 2);
        assert_eq!(cfg.max_players, 2);
    }

    #[test]
    fn test_lookup_unknown_game_type_is_none() {
        assert!(lookup("chess").is_none());
    }

    #[test]
    fn test_werewolf_state_mode_with_zero_rate_starts_no_tick() {
        let cfg = lookup("werewolf").unwrap();
        assert_eq!(cfg.tick_rate, 0);
        assert_eq!(cfg.effective_tick_rate(), 0);
    }

    #[test]
    fn test_frame_mode_uses_declared_tick_rate() {
        let cfg = lookup("shooter2d").unwrap();
        assert_eq!(cfg.effective_tick_rate(), 20);
    }

    #[test]
    fn test_event_mode_has_no_tick() {
        let cfg = lookup("monopoly").unwrap();
        assert_eq!(cfg.effective_tick_rate(), 0);
    }
}
