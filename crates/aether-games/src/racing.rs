//! Top-down racing game: frame-synchronous (§4.4.3 `frame` sync mode).
//!
//! Grounded on `original_source/server/games/racing.py`. A fixed track
//! with four checkpoints and a 3-lap race. The original's countdown
//! logic decrements once per `update()` call gated on `dt >= 1`, which
//! assumes a ~1Hz update cadence; this game type's declared tick rate is
//! 30Hz (dt ≈ 0.033s per tick), so that gate would never fire. This port
//! instead accumulates elapsed wall-clock time and steps the countdown
//! on whole-second boundaries — see DESIGN.md.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use aether_protocol::UserId;

use crate::variant::{ActionOutcome, GameResult, GameVariant, PlayerSnapshot};

const MAX_SPEED: f64 = 200.0;
const ACCELERATION: f64 = 50.0;
const BRAKE_FORCE: f64 = 80.0;
const TURN_SPEED: f64 = 2.5;
const DRAG: f64 = 0.02;
const CHECKPOINT_RADIUS: f64 = 5.0;
const TOTAL_LAPS: u32 = 3;
const COUNTDOWN_START: i32 = 3;

const CHECKPOINTS: [(f64, f64); 4] = [(500.0, 100.0), (900.0, 300.0), (500.0, 500.0), (100.0, 300.0)];
const START_POSITIONS: [(f64, f64, f64); 4] = [
    (100.0, 250.0, 0.0),
    (100.0, 290.0, 0.0),
    (100.0, 330.0, 0.0),
    (100.0, 370.0, 0.0),
];

#[derive(Serialize, Clone)]
struct Car {
    user_id: UserId,
    x: f64,
    y: f64,
    rotation: f64,
    speed: f64,
    lap: u32,
    checkpoint: usize,
    rank: Option<u32>,
    finished: bool,
    #[serde(skip)]
    throttle: f64,
    #[serde(skip)]
    brake: f64,
    #[serde(skip)]
    steering: f64,
}

pub struct RacingGame {
    cars: Vec<Car>,
    state: &'static str,
    countdown: i32,
    countdown_accum: f64,
    next_rank: u32,
    is_finished: bool,
    winner: Option<UserId>,
    frame_id: u64,
}

impl RacingGame {
    pub fn new(players: &[PlayerSnapshot]) -> Self {
        let cars = players
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let (x, y, rotation) = START_POSITIONS[idx % START_POSITIONS.len()];
                Car {
                    user_id: p.user_id,
                    x,
                    y,
                    rotation,
                    speed: 0.0,
                    lap: 0,
                    checkpoint: 0,
                    rank: None,
                    finished: false,
                    throttle: 0.0,
                    brake: 0.0,
                    steering: 0.0,
                }
            })
            .collect();
        Self {
            cars,
            state: "countdown",
            countdown: COUNTDOWN_START,
            countdown_accum: 0.0,
            next_rank: 1,
            is_finished: false,
            winner: None,
            frame_id: 0,
        }
    }

    fn car_mut(&mut self, user: UserId) -> Option<&mut Car> {
        self.cars.iter_mut().find(|c| c.user_id == user)
    }

    fn car(&self, user: UserId) -> Option<&Car> {
        self.cars.iter().find(|c| c.user_id == user)
    }

    fn serialize_cars(&self) -> Value {
        self.cars.iter().map(|c| serde_json::to_value(c).unwrap()).collect()
    }

    fn update_physics(&mut self, dt: f64) {
        for car in &mut self.cars {
            if car.finished {
                continue;
            }
            if car.speed.abs() > 1.0 {
                car.rotation += car.steering * TURN_SPEED * dt * (car.speed / MAX_SPEED).signum();
            }
            if car.throttle > 0.0 {
                car.speed += car.throttle * ACCELERATION * dt;
            }
            if car.brake > 0.0 {
                car.speed -= car.brake * BRAKE_FORCE * dt;
            }
            car.speed *= 1.0 - DRAG;
            car.speed = car.speed.clamp(-MAX_SPEED / 2.0, MAX_SPEED);
            car.x += car.rotation.cos() * car.speed * dt;
            car.y += car.rotation.sin() * car.speed * dt;
        }
    }

    fn check_checkpoints_and_laps(&mut self) {
        let total = CHECKPOINTS.len();
        for car in &mut self.cars {
            if car.finished {
                continue;
            }
            let (tx, ty) = CHECKPOINTS[car.checkpoint % total];
            let dx = car.x - tx;
            let dy = car.y - ty;
            if (dx * dx + dy * dy).sqrt() < CHECKPOINT_RADIUS {
                let wrapped = car.checkpoint % total == total - 1;
                car.checkpoint = (car.checkpoint + 1) % total;
                if wrapped {
                    car.lap += 1;
                }
            }
        }
    }

    fn check_finish(&mut self, force: Option<UserId>) {
        if let Some(user) = force {
            if let Some(car) = self.car_mut(user) {
                if !car.finished {
                    car.finished = true;
                    car.rank = Some(self.next_rank);
                    self.next_rank += 1;
                }
            }
        } else {
            let to_finish: Vec<UserId> = self
                .cars
                .iter()
                .filter(|c| !c.finished && c.lap >= TOTAL_LAPS)
                .map(|c| c.user_id)
                .collect();
            for user in to_finish {
                if let Some(car) = self.car_mut(user) {
                    car.finished = true;
                    car.rank = Some(self.next_rank);
                    self.next_rank += 1;
                }
            }
        }

        if !self.cars.is_empty() && self.cars.iter().all(|c| c.finished) {
            self.is_finished = true;
            self.state = "finished";
            self.winner = self
                .cars
                .iter()
                .find(|c| c.rank == Some(1))
                .map(|c| c.user_id);
        }
    }
}

impl GameVariant for RacingGame {
    fn init_game(&mut self) -> Value {
        json!({
            "type": "game_start",
            "game_type": "racing",
            "state": self.state,
            "total_laps": TOTAL_LAPS,
            "checkpoints": CHECKPOINTS,
            "cars": self.serialize_cars(),
        })
    }

    fn process_action(&mut self, user: UserId, action: &str, data: &Value) -> ActionOutcome {
        if action != "game_input" {
            return ActionOutcome::rejected("unknown action");
        }
        if self.state != "countdown" && self.state != "racing" {
            return ActionOutcome::rejected("inputs not accepted in this phase");
        }
        let throttle = data.get("throttle").and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0);
        let brake = data.get("brake").and_then(Value::as_f64).unwrap_or(0.0).clamp(0.0, 1.0);
        let steering = data.get("steering").and_then(Value::as_f64).unwrap_or(0.0).clamp(-1.0, 1.0);
        let Some(car) = self.car_mut(user) else {
            return ActionOutcome::rejected("not a player in this game");
        };
        if car.finished {
            return ActionOutcome::rejected("car has already finished");
        }
        car.throttle = throttle;
        car.brake = brake;
        car.steering = steering;
        ActionOutcome::accepted_silent()
    }

    fn update(&mut self, dt: Duration) {
        if self.is_finished {
            return;
        }
        let dt_secs = dt.as_secs_f64();
        match self.state {
            "countdown" => {
                self.countdown_accum += dt_secs;
                while self.countdown_accum >= 1.0 && self.countdown > 0 {
                    self.countdown -= 1;
                    self.countdown_accum -= 1.0;
                }
                if self.countdown <= 0 {
                    self.state = "racing";
                }
            }
            "racing" => {
                self.update_physics(dt_secs);
                self.check_checkpoints_and_laps();
                self.check_finish(None);
            }
            _ => {}
        }
        self.frame_id += 1;
    }

    fn get_state(&self) -> Value {
        json!({
            "state": self.state,
            "countdown": self.countdown.max(0),
            "cars": self.serialize_cars(),
            "frame_id": self.frame_id,
        })
    }

    fn check_game_over(&self) -> Option<GameResult> {
        if !self.is_finished {
            return None;
        }
        let total = self.cars.len() as i64;
        let scores = self
            .cars
            .iter()
            .map(|c| {
                let rank = c.rank.unwrap_or(total as u32) as i64;
                (c.user_id, (total - rank + 1) * 10)
            })
            .collect();
        Some(GameResult {
            winner: self.winner,
            scores,
            stats: json!({"cars": self.serialize_cars()}),
        })
    }

    fn handle_disconnect(&mut self, user: UserId) -> Option<Value> {
        self.check_finish(Some(user));
        Some(json!({"disconnected": user}))
    }

    fn is_finished(&self) -> bool {
        self.is_finished
    }

    fn frame_id(&self) -> u64 {
        self.frame_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(n: usize) -> Vec<PlayerSnapshot> {
        (1..=n as u64)
            .map(|i| PlayerSnapshot { user_id: UserId(i), display_name: format!("p{i}") })
            .collect()
    }

    #[test]
    fn test_countdown_advances_to_racing_after_three_seconds() {
        let mut game = RacingGame::new(&players(2));
        assert_eq!(game.state, "countdown");
        for _ in 0..3 {
            game.update(Duration::from_secs(1));
        }
        assert_eq!(game.state, "racing");
    }

    #[test]
    fn test_countdown_does_not_advance_on_sub_second_ticks_alone() {
        let mut game = RacingGame::new(&players(2));
        for _ in 0..10 {
            game.update(Duration::from_millis(33)); // 30Hz tick, ~0.33s total
        }
        assert_eq!(game.state, "countdown");
    }

    #[test]
    fn test_game_input_rejected_before_countdown_or_while_racing_only() {
        let mut game = RacingGame::new(&players(2));
        let user = game.players_user_id(0);
        let outcome = game.process_action(user, "game_input", &json!({"throttle": 1.0}));
        assert!(outcome.accepted);
    }

    #[test]
    fn test_disconnect_forces_finish_and_assigns_rank() {
        let mut game = RacingGame::new(&players(2));
        let user = game.players_user_id(0);
        game.handle_disconnect(user);
        assert_eq!(game.car(user).unwrap().rank, Some(1));
    }

    #[test]
    fn test_all_finished_ends_game_with_rank_one_as_winner() {
        let mut game = RacingGame::new(&players(2));
        let (a, b) = (game.players_user_id(0), game.players_user_id(1));
        game.handle_disconnect(a);
        game.handle_disconnect(b);
        assert!(game.is_finished());
        assert_eq!(game.winner, Some(a));
    }

    impl RacingGame {
        fn players_user_id(&self, idx: usize) -> UserId {
            self.cars[idx].user_id
        }
    }
}
