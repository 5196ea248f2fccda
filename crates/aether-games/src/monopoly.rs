//! Simplified Monopoly-like board game: turn-based, event-synchronous.
//!
//! Grounded on `original_source/server/games/monopoly.py`. Dice roll only
//! in the "rolling" phase; buying only in "action" phase on an unowned
//! purchasable tile the player can afford; bankruptcy releases owned
//! tiles and marks the player inactive; last solvent player wins.

use serde_json::{json, Value};

use aether_protocol::UserId;

use crate::variant::{ActionOutcome, GameResult, GameVariant, PlayerSnapshot};

const START_BONUS: i64 = 2000;
const STARTING_MONEY: i64 = 15000;

#[derive(Clone)]
struct Tile {
    kind: &'static str,
    name: &'static str,
    price: i64,
    rent: Vec<i64>,
    tax: i64,
    owner: Option<UserId>,
}

fn default_map() -> Vec<Tile> {
    vec![
        Tile { kind: "start", name: "Start", price: 0, rent: vec![], tax: 0, owner: None },
        Tile { kind: "property", name: "Mediterranean Avenue", price: 600, rent: vec![20, 100, 300, 900, 1600], tax: 0, owner: None },
        Tile { kind: "chest", name: "Community Chest", price: 0, rent: vec![], tax: 0, owner: None },
        Tile { kind: "property", name: "Baltic Avenue", price: 600, rent: vec![40, 200, 600, 1800, 3200], tax: 0, owner: None },
        Tile { kind: "tax", name: "Income Tax", price: 0, rent: vec![], tax: 200, owner: None },
        Tile { kind: "station", name: "Railroad", price: 2000, rent: vec![250, 500, 1000, 2000], tax: 0, owner: None },
        Tile { kind: "property", name: "Oriental Avenue", price: 1000, rent: vec![60, 300, 900, 2700, 4000], tax: 0, owner: None },
        Tile { kind: "chance", name: "Chance", price: 0, rent: vec![], tax: 0, owner: None },
        Tile { kind: "property", name: "Vermont Avenue", price: 1000, rent: vec![60, 300, 900, 2700, 4000], tax: 0, owner: None },
        Tile { kind: "property", name: "Connecticut Avenue", price: 1200, rent: vec![80, 400, 1000, 3000, 4500], tax: 0, owner: None },
    ]
}

struct PlayerState {
    user_id: UserId,
    display_name: String,
    position: usize,
    money: i64,
    properties: Vec<usize>,
    bankrupt: bool,
}

pub struct MonopolyGame {
    /// Join order — also the bankruptcy-skip rotation order.
    order: Vec<UserId>,
    players: Vec<PlayerState>,
    tiles: Vec<Tile>,
    current_player: Option<UserId>,
    phase: &'static str,
    winner: Option<UserId>,
    is_finished: bool,
    frame_id: u64,
}

impl MonopolyGame {
    pub fn new(players: &[PlayerSnapshot]) -> Self {
        let order: Vec<UserId> = players.iter().map(|p| p.user_id).collect();
        let state = players
            .iter()
            .map(|p| PlayerState {
                user_id: p.user_id,
                display_name: p.display_name.clone(),
                position: 0,
                money: STARTING_MONEY,
                properties: Vec::new(),
                bankrupt: false,
            })
            .collect();
        Self {
            current_player: order.first().copied(),
            order,
            players: state,
            tiles: default_map(),
            phase: "rolling",
            winner: None,
            is_finished: false,
            frame_id: 0,
        }
    }

    fn player_mut(&mut self, user: UserId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| p.user_id == user)
    }

    fn player(&self, user: UserId) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.user_id == user)
    }

    fn serialize_players(&self) -> Value {
        self.players
            .iter()
            .map(|p| {
                json!({
                    "user_id": p.user_id,
                    "display_name": p.display_name,
                    "position": p.position,
                    "money": p.money,
                    "bankrupt": p.bankrupt,
                    "properties": p.properties,
                })
            })
            .collect()
    }

    fn serialize_tiles(&self) -> Value {
        self.tiles
            .iter()
            .enumerate()
            .map(|(id, t)| {
                json!({
                    "id": id,
                    "type": t.kind,
                    "name": t.name,
                    "owner": t.owner,
                    "price": t.price,
                    "rent": t.rent,
                })
            })
            .collect()
    }

    /// Moves the player `steps` tiles around the board, crediting
    /// `START_BONUS` if they pass (or land on) the start tile.
    fn move_player(&mut self, user: UserId, steps: u32) -> bool {
        let tiles_len = self.tiles.len();
        let Some(player) = self.player_mut(user) else { return false };
        let old = player.position;
        let new_pos = (old + steps as usize) % tiles_len;
        let passed_start = new_pos < old;
        player.position = new_pos;
        if passed_start {
            player.money += START_BONUS;
        }
        passed_start
    }

    /// Applies tax/rent effects for landing on the player's current tile.
    fn handle_tile(&mut self, user: UserId) -> Option<Value> {
        let position = self.player(user)?.position;
        let tile = self.tiles.get(position)?.clone();
        match tile.kind {
            "tax" => {
                let player = self.player_mut(user)?;
                player.money = (player.money - tile.tax).max(0);
                Some(json!({"tax": tile.tax, "money": player.money}))
            }
            "property" => {
                let owner = tile.owner?;
                if owner == user {
                    return None;
                }
                let rent = tile.rent.first().copied().unwrap_or(0);
                {
                    let player = self.player_mut(user)?;
                    player.money = (player.money - rent).max(0);
                }
                if let Some(owner_state) = self.player_mut(owner) {
                    owner_state.money += rent;
                }
                let money = self.player(user)?.money;
                Some(json!({"pay_rent": {"to": owner, "amount": rent}, "money": money}))
            }
            _ => None,
        }
    }

    fn alive_ids(&self) -> Vec<UserId> {
        self.order
            .iter()
            .copied()
            .filter(|u| self.player(*u).map(|p| !p.bankrupt).unwrap_or(false))
            .collect()
    }

    fn next_player(&mut self) {
        let alive = self.alive_ids();
        if alive.is_empty() {
            self.is_finished = true;
            self.winner = None;
            return;
        }
        let current_idx = self
            .current_player
            .and_then(|c| alive.iter().position(|u| *u == c));
        let next_idx = match current_idx {
            Some(idx) => (idx + 1) % alive.len(),
            None => 0,
        };
        self.current_player = Some(alive[next_idx]);
        self.phase = "rolling";
    }

    fn check_bankrupt(&mut self) {
        let bankrupt_ids: Vec<UserId> = self
            .players
            .iter()
            .filter(|p| p.money <= 0 && !p.bankrupt)
            .map(|p| p.user_id)
            .collect();
        for uid in bankrupt_ids {
            if let Some(player) = self.player_mut(uid) {
                player.bankrupt = true;
                player.properties.clear();
            }
            for tile in &mut self.tiles {
                if tile.owner == Some(uid) {
                    tile.owner = None;
                }
            }
        }
    }

    fn check_win(&mut self) {
        let alive = self.alive_ids();
        if alive.len() == 1 {
            self.is_finished = true;
            self.winner = Some(alive[0]);
            self.phase = "end";
        }
    }
}

impl GameVariant for MonopolyGame {
    fn init_game(&mut self) -> Value {
        json!({
            "type": "game_start",
            "game_type": "monopoly",
            "phase": self.phase,
            "current_player": self.current_player,
            "players": self.serialize_players(),
            "tiles": self.serialize_tiles(),
        })
    }

    fn process_action(&mut self, user: UserId, action: &str, data: &Value) -> ActionOutcome {
        if self.is_finished || Some(user) != self.current_player {
            return ActionOutcome::rejected("not your turn");
        }
        match self.player(user) {
            Some(p) if !p.bankrupt => {}
            _ => return ActionOutcome::rejected("invalid player"),
        }

        match (action, self.phase) {
            ("roll_dice", "rolling") => {
                let d1 = 1 + rand_die();
                let d2 = 1 + rand_die();
                let steps = d1 + d2;
                let passed_start = self.move_player(user, steps);
                self.phase = "action";
                let follow = self.handle_tile(user);
                self.check_bankrupt();
                self.check_win();

                let mut broadcast = json!({
                    "type": "game_action",
                    "action": "player_move",
                    "user_id": user,
                    "position": self.player(user).map(|p| p.position),
                    "dice": [d1, d2],
                    "passed_start": passed_start,
                    "players": self.serialize_players(),
                });
                if let Some(follow) = follow {
                    if let (Some(dst), Some(src)) = (broadcast.as_object_mut(), follow.as_object()) {
                        for (k, v) in src {
                            dst.insert(k.clone(), v.clone());
                        }
                    }
                }
                self.frame_id += 1;
                ActionOutcome::accepted_broadcast(broadcast)
            }
            ("buy_property", "action") => {
                let Some(position) = self.player(user).map(|p| p.position) else {
                    return ActionOutcome::rejected("invalid player");
                };
                let Some(tile) = self.tiles.get(position) else {
                    return ActionOutcome::rejected("no such tile");
                };
                if tile.kind != "property" {
                    return ActionOutcome::rejected("tile not purchasable");
                }
                if tile.owner.is_some() {
                    return ActionOutcome::rejected("tile already owned");
                }
                let price = tile.price;
                let Some(player) = self.player_mut(user) else {
                    return ActionOutcome::rejected("invalid player");
                };
                if player.money < price {
                    return ActionOutcome::rejected("insufficient funds");
                }
                player.money -= price;
                player.properties.push(position);
                self.tiles[position].owner = Some(user);
                self.phase = "end_turn";
                self.frame_id += 1;
                ActionOutcome::accepted_broadcast(json!({
                    "type": "game_action",
                    "action": "buy_property",
                    "user_id": user,
                    "tile_id": position,
                    "money": self.player(user).map(|p| p.money),
                }))
            }
            ("end_turn", "action") | ("end_turn", "end_turn") => {
                self.next_player();
                self.frame_id += 1;
                ActionOutcome::accepted_broadcast(json!({
                    "type": "game_action",
                    "action": "turn_end",
                    "next_player": self.current_player,
                    "phase": self.phase,
                }))
            }
            _ => {
                let _ = data;
                ActionOutcome::rejected("invalid action or phase")
            }
        }
    }

    fn get_state(&self) -> Value {
        json!({
            "phase": self.phase,
            "current_player": self.current_player,
            "players": self.serialize_players(),
            "tiles": self.serialize_tiles(),
            "frame_id": self.frame_id,
        })
    }

    fn check_game_over(&self) -> Option<GameResult> {
        if !self.is_finished {
            return None;
        }
        let scores = self.players.iter().map(|p| (p.user_id, p.money)).collect();
        Some(GameResult {
            winner: self.winner,
            scores,
            stats: json!({"tiles": self.serialize_tiles(), "players": self.serialize_players()}),
        })
    }

    fn handle_disconnect(&mut self, user: UserId) -> Option<Value> {
        if let Some(player) = self.player_mut(user) {
            if !player.bankrupt {
                player.bankrupt = true;
                player.properties.clear();
                for tile in &mut self.tiles {
                    if tile.owner == Some(user) {
                        tile.owner = None;
                    }
                }
            }
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

fn rand_die() -> i64 {
    use rand::Rng;
    rand::rng().random_range(0..6)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<PlayerSnapshot> {
        vec![
            PlayerSnapshot { user_id: UserId(1), display_name: "alice".into() },
            PlayerSnapshot { user_id: UserId(2), display_name: "bob".into() },
        ]
    }

    #[test]
    fn test_buy_without_rolling_first_is_rejected() {
        let mut game = MonopolyGame::new(&players());
        let outcome = game.process_action(UserId(1), "buy_property", &json!({}));
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_buy_with_insufficient_funds_is_rejected() {
        let mut game = MonopolyGame::new(&players());
        game.player_mut(UserId(1)).unwrap().money = 0;
        game.player_mut(UserId(1)).unwrap().position = 1; // Mediterranean Ave
        game.phase = "action";
        let outcome = game.process_action(UserId(1), "buy_property", &json!({}));
        assert!(!outcome.accepted);
        assert_eq!(game.player(UserId(1)).unwrap().money, 0);
    }

    #[test]
    fn test_buy_property_deducts_price_and_sets_owner() {
        let mut game = MonopolyGame::new(&players());
        game.player_mut(UserId(1)).unwrap().position = 1;
        game.phase = "action";
        let outcome = game.process_action(UserId(1), "buy_property", &json!({}));
        assert!(outcome.accepted);
        assert_eq!(game.tiles[1].owner, Some(UserId(1)));
        assert_eq!(game.player(UserId(1)).unwrap().money, STARTING_MONEY - 600);
    }

    #[test]
    fn test_end_turn_rotates_to_next_player() {
        let mut game = MonopolyGame::new(&players());
        game.phase = "action";
        let outcome = game.process_action(UserId(1), "end_turn", &json!({}));
        assert!(outcome.accepted);
        assert_eq!(game.current_player, Some(UserId(2)));
    }

    #[test]
    fn test_bankruptcy_releases_tiles_and_declares_winner() {
        let mut game = MonopolyGame::new(&players());
        game.tiles[1].owner = Some(UserId(1));
        game.player_mut(UserId(1)).unwrap().properties.push(1);
        let disconnect = game.handle_disconnect(UserId(1));
        assert!(disconnect.is_some());
        assert!(game.tiles[1].owner.is_none());
        assert!(game.is_finished());
        assert_eq!(game.check_game_over().unwrap().winner, Some(UserId(2)));
    }
}
