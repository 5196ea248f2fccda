//! Simplified social-deduction game: night/day/vote phase clock (§4.4.3
//! `state` sync mode).
//!
//! Grounded on `original_source/server/games/werewolf.py`. Roles are
//! dealt once at game start (at least one werewolf and one seer when
//! there are at least two players); `wolf_kill`/`seer_check` are
//! recorded during "night"; `vote` tallies during "vote". Phase
//! resolution (night kill, vote tally, the night/day/vote rotation) is
//! implemented in [`update`], but werewolf declares `tick_rate: 0`
//! (§D) and `State`-sync games only get a tick task for a positive
//! rate, so — same as the original, whose `_tick_loop` is only started
//! for `tick_rate > 0` — nothing in a live room calls `update` on a
//! cadence. `update` is exercised directly by the unit tests below.

use std::collections::HashMap;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde_json::{json, Value};

use aether_protocol::UserId;

use crate::variant::{uid_key, ActionOutcome, GameResult, GameVariant, PlayerSnapshot};

const NIGHT_SECONDS: f64 = 20.0;
const DAY_SECONDS: f64 = 30.0;
const VOTE_SECONDS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Werewolf,
    Villager,
    Seer,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::Werewolf => "werewolf",
            Role::Villager => "villager",
            Role::Seer => "seer",
        }
    }
}

struct PlayerState {
    user_id: UserId,
    role: Role,
    alive: bool,
}

pub struct WerewolfGame {
    players: Vec<PlayerState>,
    phase: &'static str,
    phase_elapsed: f64,
    day_count: u32,
    last_kill: Option<UserId>,
    last_check: HashMap<UserId, (UserId, bool)>,
    votes: HashMap<UserId, UserId>,
    winner_side: Option<&'static str>,
    is_finished: bool,
    frame_id: u64,
}

impl WerewolfGame {
    pub fn new(players: &[PlayerSnapshot]) -> Self {
        let roles = generate_roles(players.len());
        let state = players
            .iter()
            .zip(roles)
            .map(|(p, role)| PlayerState { user_id: p.user_id, role, alive: true })
            .collect();
        Self {
            players: state,
            phase: "night",
            phase_elapsed: 0.0,
            day_count: 0,
            last_kill: None,
            last_check: HashMap::new(),
            votes: HashMap::new(),
            winner_side: None,
            is_finished: false,
            frame_id: 0,
        }
    }

    fn player(&self, user: UserId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.user_id == user)
    }

    fn player_mut(&mut self, user: UserId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.user_id == user)
    }

    fn is_alive(&self, user: UserId) -> bool {
        self.player(user).map(|p| p.alive).unwrap_or(false)
    }

    fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    fn wolves_alive(&self) -> usize {
        self.players.iter().filter(|p| p.alive && p.role == Role::Werewolf).count()
    }

    fn serialize_players(&self, include_roles: bool) -> Value {
        self.players
            .iter()
            .map(|p| {
                let mut obj = json!({"user_id": p.user_id, "alive": p.alive});
                if include_roles {
                    obj["role"] = json!(p.role.as_str());
                }
                obj
            })
            .collect()
    }

    fn resolve_night(&mut self) {
        if let Some(target) = self.last_kill {
            if self.is_alive(target) {
                if let Some(p) = self.player_mut(target) {
                    p.alive = false;
                }
            }
        }
        self.day_count += 1;
        self.last_kill = None;
        self.last_check.clear();
        self.votes.clear();
        self.phase = "day";
        self.phase_elapsed = 0.0;
    }

    fn resolve_vote(&mut self) {
        let mut tally: HashMap<UserId, u32> = HashMap::new();
        for target in self.votes.values() {
            *tally.entry(*target).or_insert(0) += 1;
        }
        if let Some((&eliminated, _)) = tally.iter().max_by_key(|(_, count)| **count) {
            if let Some(p) = self.player_mut(eliminated) {
                p.alive = false;
            }
        }
        self.votes.clear();
        self.last_kill = None;
        self.last_check.clear();
        self.phase = "night";
        self.phase_elapsed = 0.0;
    }

    fn check_win(&mut self) {
        if self.is_finished {
            return;
        }
        let wolves = self.wolves_alive();
        let others = self.alive_count().saturating_sub(wolves);
        if wolves == 0 {
            self.winner_side = Some("villagers");
            self.is_finished = true;
            self.phase = "over";
        } else if wolves >= others {
            self.winner_side = Some("werewolves");
            self.is_finished = true;
            self.phase = "over";
        }
    }

    fn representative_winner(&self) -> Option<UserId> {
        let side = self.winner_side?;
        self.players
            .iter()
            .find(|p| match side {
                "werewolves" => p.role == Role::Werewolf,
                _ => p.role != Role::Werewolf,
            })
            .map(|p| p.user_id)
    }
}

fn generate_roles(count: usize) -> Vec<Role> {
    let mut roles = vec![Role::Villager; count];
    if count >= 2 {
        roles[0] = Role::Werewolf;
        roles[1] = Role::Seer;
    }
    roles.shuffle(&mut rand::rng());
    roles
}

impl GameVariant for WerewolfGame {
    fn init_game(&mut self) -> Value {
        json!({
            "type": "game_start",
            "game_type": "werewolf",
            "phase": self.phase,
            "day": self.day_count,
            "players": self.serialize_players(false),
        })
    }

    fn get_private_init(&self, user: UserId) -> Option<Value> {
        let role = self.player(user)?.role.as_str();
        Some(json!({"role": role}))
    }

    fn process_action(&mut self, user: UserId, action: &str, data: &Value) -> ActionOutcome {
        if self.is_finished {
            return ActionOutcome::rejected("game already finished");
        }
        let Some(acting) = self.player(user) else {
            return ActionOutcome::rejected("not a player in this game");
        };
        if !acting.alive {
            return ActionOutcome::rejected("player is not alive");
        }
        let acting_role = acting.role;

        match action {
            "wolf_kill" => {
                if self.phase != "night" {
                    return ActionOutcome::rejected("wolf_kill only allowed at night");
                }
                if acting_role != Role::Werewolf {
                    return ActionOutcome::rejected("only werewolves may kill");
                }
                let Some(target) = target_user_id(data) else {
                    return ActionOutcome::rejected("missing target");
                };
                if !self.is_alive(target) {
                    return ActionOutcome::rejected("target is not alive");
                }
                self.last_kill = Some(target);
                ActionOutcome::accepted_silent()
            }
            "seer_check" => {
                if self.phase != "night" {
                    return ActionOutcome::rejected("seer_check only allowed at night");
                }
                if acting_role != Role::Seer {
                    return ActionOutcome::rejected("only the seer may check");
                }
                let Some(target) = target_user_id(data) else {
                    return ActionOutcome::rejected("missing target");
                };
                if !self.is_alive(target) {
                    return ActionOutcome::rejected("target is not alive");
                }
                let is_wolf = self.player(target).map(|p| p.role == Role::Werewolf).unwrap_or(false);
                self.last_check.insert(user, (target, is_wolf));
                ActionOutcome::accepted_private(json!({
                    "success": true,
                    "target": target,
                    "is_wolf": is_wolf,
                }))
            }
            "vote" => {
                if self.phase != "vote" {
                    return ActionOutcome::rejected("vote only allowed during the vote phase");
                }
                let Some(target) = target_user_id(data) else {
                    return ActionOutcome::rejected("missing target");
                };
                if !self.is_alive(target) {
                    return ActionOutcome::rejected("target is not alive");
                }
                self.votes.insert(user, target);
                ActionOutcome::accepted_silent()
            }
            _ => ActionOutcome::rejected("unknown action"),
        }
    }

    fn update(&mut self, dt: Duration) {
        if self.is_finished {
            return;
        }
        self.phase_elapsed += dt.as_secs_f64();
        match self.phase {
            "night" if self.phase_elapsed >= NIGHT_SECONDS => {
                self.resolve_night();
                self.frame_id += 1;
            }
            "day" if self.phase_elapsed >= DAY_SECONDS => {
                self.phase = "vote";
                self.phase_elapsed = 0.0;
                self.frame_id += 1;
            }
            "vote" if self.phase_elapsed >= VOTE_SECONDS => {
                self.resolve_vote();
                self.frame_id += 1;
            }
            _ => {}
        }
        self.check_win();
    }

    fn get_state(&self) -> Value {
        let last_check: serde_json::Map<String, Value> = self
            .last_check
            .iter()
            .map(|(seer, (target, is_wolf))| {
                (uid_key(*seer), json!({"target": target, "is_wolf": is_wolf}))
            })
            .collect();
        json!({
            "phase": self.phase,
            "day": self.day_count,
            "players": self.serialize_players(self.is_finished),
            "last_kill": self.last_kill,
            "last_check": last_check,
            "votes": self.votes.iter().map(|(k, v)| (uid_key(*k), json!(v))).collect::<serde_json::Map<_, _>>(),
            "frame_id": self.frame_id,
        })
    }

    fn check_game_over(&self) -> Option<GameResult> {
        if !self.is_finished {
            return None;
        }
        let scores = self
            .players
            .iter()
            .map(|p| (p.user_id, if p.alive { 100 } else { 0 }))
            .collect();
        Some(GameResult {
            winner: self.representative_winner(),
            scores,
            stats: json!({
                "day": self.day_count,
                "phase": self.phase,
                "winner_side": self.winner_side,
                "players": self.serialize_players(true),
            }),
        })
    }

    fn handle_disconnect(&mut self, user: UserId) -> Option<Value> {
        if let Some(p) = self.player_mut(user) {
            p.alive = false;
        }
        self.check_win();
        Some(json!({"disconnected": user}))
    }

    fn is_finished(&self) -> bool {
        self.is_finished
    }

    fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

fn target_user_id(data: &Value) -> Option<UserId> {
    data.get("target").and_then(Value::as_u64).map(UserId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(n: usize) -> Vec<PlayerSnapshot> {
        (1..=n as u64)
            .map(|i| PlayerSnapshot { user_id: UserId(i), display_name: format!("p{i}") })
            .collect()
    }

    fn find_role(game: &WerewolfGame, role: Role) -> UserId {
        game.players.iter().find(|p| p.role == role).unwrap().user_id
    }

    #[test]
    fn test_role_deal_has_one_wolf_and_one_seer_for_six_players() {
        let game = WerewolfGame::new(&players(6));
        assert_eq!(game.players.iter().filter(|p| p.role == Role::Werewolf).count(), 1);
        assert_eq!(game.players.iter().filter(|p| p.role == Role::Seer).count(), 1);
    }

    #[test]
    fn test_villager_cannot_wolf_kill() {
        let mut game = WerewolfGame::new(&players(6));
        let villager = game
            .players
            .iter()
            .find(|p| p.role == Role::Villager)
            .unwrap()
            .user_id;
        let target = players(6)[0].user_id;
        let outcome = game.process_action(villager, "wolf_kill", &json!({"target": target.0}));
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_seer_check_is_private_reply_only() {
        let mut game = WerewolfGame::new(&players(6));
        let seer = find_role(&game, Role::Seer);
        let wolf = find_role(&game, Role::Werewolf);
        let outcome = game.process_action(seer, "seer_check", &json!({"target": wolf.0}));
        assert!(outcome.accepted);
        assert!(outcome.broadcast.is_none());
        assert_eq!(outcome.private_reply.unwrap()["is_wolf"], true);
    }

    #[test]
    fn test_night_resolves_kill_after_elapsed_time() {
        let mut game = WerewolfGame::new(&players(6));
        let wolf = find_role(&game, Role::Werewolf);
        let victim = players(6).into_iter().find(|p| p.user_id != wolf).unwrap().user_id;
        game.process_action(wolf, "wolf_kill", &json!({"target": victim.0}));
        game.update(Duration::from_secs_f64(NIGHT_SECONDS));
        assert!(!game.is_alive(victim));
        assert_eq!(game.phase, "day");
    }

    #[test]
    fn test_wolves_equal_others_wins_for_wolves() {
        let mut game = WerewolfGame::new(&players(2));
        // force: one wolf, one non-wolf — wolves(1) >= others(1) immediately.
        game.check_win();
        assert!(game.is_finished());
        assert_eq!(game.winner_side, Some("werewolves"));
    }

    #[test]
    fn test_disconnect_rechecks_win_condition() {
        let mut game = WerewolfGame::new(&players(6));
        let wolf = find_role(&game, Role::Werewolf);
        game.handle_disconnect(wolf);
        assert!(game.is_finished());
        assert_eq!(game.winner_side, Some("villagers"));
    }
}
