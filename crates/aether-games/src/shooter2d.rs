//! Top-down 2D shooter: frame-synchronous (§4.4.3 `frame` sync mode).
//!
//! Grounded on `original_source/server/games/shooter2d.py`. Movement
//! input is buffered per tick and applied in [`update`] (continuous
//! sending required — a single `move` only affects the next frame);
//! `fire` spawns a bullet and broadcasts immediately rather than
//! waiting for the next `game_sync`, to cut perceived latency.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use aether_protocol::UserId;

use crate::variant::{ActionOutcome, GameResult, GameVariant, PlayerSnapshot};

const MAP_WIDTH: f64 = 1920.0;
const MAP_HEIGHT: f64 = 1080.0;
const PLAYER_SPEED: f64 = 200.0;
const BULLET_SPEED: f64 = 500.0;
const PLAYER_RADIUS: f64 = 18.0;
const BULLET_RADIUS: f64 = 6.0;
const MAX_HEALTH: i32 = 100;
const BULLET_DAMAGE: i32 = 10;
const HIT_RADIUS_SQ: f64 = (PLAYER_RADIUS + BULLET_RADIUS) * (PLAYER_RADIUS + BULLET_RADIUS);

#[derive(Serialize, Clone)]
struct Player {
    user_id: UserId,
    team: u8,
    x: f64,
    y: f64,
    rotation: f64,
    health: i32,
    is_alive: bool,
    #[serde(skip)]
    pending_dx: f64,
    #[serde(skip)]
    pending_dy: f64,
}

#[derive(Serialize, Clone)]
struct Bullet {
    id: String,
    owner_id: UserId,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

pub struct Shooter2dGame {
    players: Vec<Player>,
    bullets: Vec<Bullet>,
    next_bullet_seq: u64,
    is_finished: bool,
    winner_team: Option<u8>,
    winner: Option<UserId>,
    frame_id: u64,
}

impl Shooter2dGame {
    pub fn new(players: &[PlayerSnapshot]) -> Self {
        let n = players.len().max(1);
        let radius = 0.35 * MAP_WIDTH.min(MAP_HEIGHT);
        let cx = MAP_WIDTH / 2.0;
        let cy = MAP_HEIGHT / 2.0;
        let state = players
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let angle = (idx as f64) * std::f64::consts::TAU / n as f64;
                Player {
                    user_id: p.user_id,
                    team: (idx % 2) as u8,
                    x: cx + radius * angle.cos(),
                    y: cy + radius * angle.sin(),
                    rotation: 0.0,
                    health: MAX_HEALTH,
                    is_alive: true,
                    pending_dx: 0.0,
                    pending_dy: 0.0,
                }
            })
            .collect();
        Self {
            players: state,
            bullets: Vec::new(),
            next_bullet_seq: 0,
            is_finished: false,
            winner_team: None,
            winner: None,
            frame_id: 0,
        }
    }

    fn player_mut(&mut self, user: UserId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.user_id == user)
    }

    fn player(&self, user: UserId) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user)
    }

    fn next_bullet_id(&mut self) -> String {
        self.next_bullet_seq += 1;
        format!("bullet-{}", self.next_bullet_seq)
    }

    fn apply_inputs(&mut self, dt: f64) {
        for p in &mut self.players {
            if !p.is_alive {
                continue;
            }
            p.x = (p.x + p.pending_dx * PLAYER_SPEED * dt).clamp(PLAYER_RADIUS, MAP_WIDTH - PLAYER_RADIUS);
            p.y = (p.y + p.pending_dy * PLAYER_SPEED * dt).clamp(PLAYER_RADIUS, MAP_HEIGHT - PLAYER_RADIUS);
            p.pending_dx = 0.0;
            p.pending_dy = 0.0;
        }
    }

    fn update_bullets(&mut self, dt: f64) -> Vec<(UserId, UserId)> {
        let mut hits = Vec::new();
        let mut keep = Vec::with_capacity(self.bullets.len());
        for mut bullet in std::mem::take(&mut self.bullets) {
            bullet.x += bullet.vx * dt;
            bullet.y += bullet.vy * dt;
            if bullet.x < 0.0 || bullet.x > MAP_WIDTH || bullet.y < 0.0 || bullet.y > MAP_HEIGHT {
                continue;
            }
            let mut consumed = false;
            for target in &mut self.players {
                if !target.is_alive || target.user_id == bullet.owner_id {
                    continue;
                }
                let dx = target.x - bullet.x;
                let dy = target.y - bullet.y;
                if dx * dx + dy * dy <= HIT_RADIUS_SQ {
                    target.health = (target.health - BULLET_DAMAGE).max(0);
                    if target.health == 0 {
                        target.is_alive = false;
                    }
                    hits.push((bullet.owner_id, target.user_id));
                    consumed = true;
                    break;
                }
            }
            if !consumed {
                keep.push(bullet);
            }
        }
        self.bullets = keep;
        hits
    }

    fn check_game_over_internal(&mut self) {
        if self.is_finished {
            return;
        }
        let teams_alive: std::collections::HashSet<u8> =
            self.players.iter().filter(|p| p.is_alive).map(|p| p.team).collect();
        if teams_alive.len() <= 1 {
            self.is_finished = true;
            self.winner_team = teams_alive.into_iter().next();
            self.winner = self
                .players
                .iter()
                .find(|p| self.winner_team == Some(p.team) && p.is_alive)
                .map(|p| p.user_id);
        }
    }

    fn serialize_players(&self) -> Value {
        self.players.iter().map(|p| serde_json::to_value(p).unwrap()).collect()
    }

    fn serialize_bullets(&self) -> Value {
        self.bullets.iter().map(|b| serde_json::to_value(b).unwrap()).collect()
    }
}

impl GameVariant for Shooter2dGame {
    fn init_game(&mut self) -> Value {
        json!({
            "type": "game_start",
            "game_type": "shooter2d",
            "map_width": MAP_WIDTH,
            "map_height": MAP_HEIGHT,
            "players": self.serialize_players(),
        })
    }

    fn process_action(&mut self, user: UserId, action: &str, data: &Value) -> ActionOutcome {
        if self.is_finished {
            return ActionOutcome::rejected("game already finished");
        }
        match self.player(user) {
            Some(p) if p.is_alive => {}
            Some(_) => return ActionOutcome::rejected("player is eliminated"),
            None => return ActionOutcome::rejected("not a player in this game"),
        }

        match action {
            "move" => {
                let dx = data.get("dx").and_then(Value::as_f64).unwrap_or(0.0);
                let dy = data.get("dy").and_then(Value::as_f64).unwrap_or(0.0);
                let mag = (dx * dx + dy * dy).sqrt();
                let (ndx, ndy) = if mag > f64::EPSILON { (dx / mag, dy / mag) } else { (0.0, 0.0) };
                if let Some(p) = self.player_mut(user) {
                    p.pending_dx = ndx;
                    p.pending_dy = ndy;
                    if mag > f64::EPSILON {
                        p.rotation = ndy.atan2(ndx);
                    }
                }
                ActionOutcome::accepted_silent()
            }
            "fire" => {
                let dx = data.get("dx").and_then(Value::as_f64).unwrap_or(0.0);
                let dy = data.get("dy").and_then(Value::as_f64).unwrap_or(0.0);
                let mag = (dx * dx + dy * dy).sqrt();
                if mag <= f64::EPSILON {
                    return ActionOutcome::rejected("invalid fire direction");
                }
                let (ndx, ndy) = (dx / mag, dy / mag);
                let Some(shooter) = self.player(user) else {
                    return ActionOutcome::rejected("not a player in this game");
                };
                let (x, y) = (shooter.x, shooter.y);
                let id = self.next_bullet_id();
                let bullet = Bullet {
                    id: id.clone(),
                    owner_id: user,
                    x,
                    y,
                    vx: ndx * BULLET_SPEED,
                    vy: ndy * BULLET_SPEED,
                };
                let bullet_json = serde_json::to_value(&bullet).unwrap();
                self.bullets.push(bullet);
                self.frame_id += 1;
                ActionOutcome::accepted_broadcast(json!({
                    "type": "game_action",
                    "action": "fire",
                    "bullet": bullet_json,
                    "frame_id": self.frame_id,
                }))
            }
            _ => ActionOutcome::rejected("unknown action"),
        }
    }

    fn update(&mut self, dt: Duration) {
        if self.is_finished {
            return;
        }
        let dt = dt.as_secs_f64();
        self.apply_inputs(dt);
        self.update_bullets(dt);
        self.check_game_over_internal();
        self.frame_id += 1;
    }

    fn get_state(&self) -> Value {
        json!({
            "players": self.serialize_players(),
            "bullets": self.serialize_bullets(),
            "is_finished": self.is_finished,
            "winner_team": self.winner_team,
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
            .map(|p| (p.user_id, if Some(p.team) == self.winner_team { 100 } else { 0 }))
            .collect();
        Some(GameResult {
            winner: self.winner,
            scores,
            stats: json!({"winner_team": self.winner_team, "players": self.serialize_players()}),
        })
    }

    fn handle_disconnect(&mut self, user: UserId) -> Option<Value> {
        if let Some(p) = self.player_mut(user) {
            p.is_alive = false;
            p.health = 0;
        }
        self.check_game_over_internal();
        Some(json!({"disconnected": user}))
    }

    fn is_finished(&self) -> bool {
        self.is_finished
    }

    fn frame_id(&self) -> u64 {
        self.frame_id
    }
}
