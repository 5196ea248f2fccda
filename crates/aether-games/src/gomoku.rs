//! Five-in-a-row (gomoku): turn-based, event-synchronous (§4.4.2).
//!
//! Grounded on `original_source/server/games/gomoku.py`. Board is
//! 15x15; a win is 5 contiguous same-color stones along any of the four
//! line directions through the last-played cell; a full board is a draw.

use serde_json::{json, Value};

use aether_protocol::UserId;

use crate::variant::{uid_key, ActionOutcome, GameResult, GameVariant, PlayerSnapshot};

const BOARD_SIZE: usize = 15;
const WIN_COUNT: usize = 5;

/// Stone color: 1 = black (first player), 2 = white.
type Color = u8;

pub struct GomokuGame {
    board: Vec<Vec<Color>>,
    history: Vec<(usize, usize, Color)>,
    /// Join order preserved so color assignment is deterministic.
    player_colors: Vec<(UserId, Color)>,
    current_player: Option<UserId>,
    winner: Option<UserId>,
    is_finished: bool,
}

impl GomokuGame {
    pub fn new(players: &[PlayerSnapshot]) -> Self {
        let mut player_colors = Vec::new();
        let mut current_player = None;
        if players.len() >= 2 {
            player_colors.push((players[0].user_id, 1));
            player_colors.push((players[1].user_id, 2));
            current_player = Some(players[0].user_id);
        }
        Self {
            board: vec![vec![0; BOARD_SIZE]; BOARD_SIZE],
            history: Vec::new(),
            player_colors,
            current_player,
            winner: None,
            is_finished: false,
        }
    }

    fn color_of(&self, user: UserId) -> Option<Color> {
        self.player_colors.iter().find(|(u, _)| *u == user).map(|(_, c)| *c)
    }

    fn other_player(&self, user: UserId) -> Option<UserId> {
        self.player_colors.iter().find(|(u, _)| *u != user).map(|(u, _)| *u)
    }

    fn switch_player(&mut self) {
        if let Some(current) = self.current_player {
            self.current_player = self.other_player(current);
        }
    }

    fn is_valid_position(row: i64, col: i64) -> bool {
        (0..BOARD_SIZE as i64).contains(&row) && (0..BOARD_SIZE as i64).contains(&col)
    }

    /// Examines the four line directions through `(row, col)`; returns the
    /// winning color if five-in-a-row is found there.
    fn check_winner(&self, row: usize, col: usize) -> Option<Color> {
        let player = self.board[row][col];
        if player == 0 {
            return None;
        }
        const DIRECTIONS: [(i64, i64); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];
        for (dr, dc) in DIRECTIONS {
            let mut count = 1;
            count += self.count_direction(row, col, dr, dc, player);
            count += self.count_direction(row, col, -dr, -dc, player);
            if count >= WIN_COUNT {
                return Some(player);
            }
        }
        None
    }

    fn count_direction(&self, row: usize, col: usize, dr: i64, dc: i64, player: Color) -> usize {
        let mut count = 0;
        let mut r = row as i64 + dr;
        let mut c = col as i64 + dc;
        while Self::is_valid_position(r, c) && self.board[r as usize][c as usize] == player {
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }

    fn is_board_full(&self) -> bool {
        self.board.iter().all(|row| row.iter().all(|&cell| cell != 0))
    }

    fn player_colors_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .player_colors
            .iter()
            .map(|(u, c)| (uid_key(*u), json!(c)))
            .collect();
        Value::Object(map)
    }
}

impl GameVariant for GomokuGame {
    fn init_game(&mut self) -> Value {
        json!({
            "type": "game_start",
            "game_type": "gomoku",
            "board_size": BOARD_SIZE,
            "player_colors": self.player_colors_json(),
            "current_player": self.current_player,
        })
    }

    fn process_action(&mut self, user: UserId, action: &str, data: &Value) -> ActionOutcome {
        if action == "surrender" {
            if self.is_finished {
                return ActionOutcome::rejected("game already finished");
            }
            if self.color_of(user).is_none() {
                return ActionOutcome::rejected("not a player in this game");
            }
            let winner = self.other_player(user);
            self.winner = winner;
            self.is_finished = true;
            return ActionOutcome::accepted_broadcast(json!({
                "type": "game_action",
                "action": "surrender",
                "loser": user,
                "winner": winner,
                "winner_color": winner.and_then(|w| self.color_of(w)),
                "game_over": true,
                "reason": "surrender",
                "frame_id": self.history.len(),
            }));
        }

        if action != "move" {
            return ActionOutcome::rejected("unknown action");
        }
        if Some(user) != self.current_player {
            return ActionOutcome::rejected("not your turn");
        }
        let row = data.get("row").and_then(Value::as_i64);
        let col = data.get("col").and_then(Value::as_i64);
        let (Some(row), Some(col)) = (row, col) else {
            return ActionOutcome::rejected("invalid position");
        };
        if !Self::is_valid_position(row, col) {
            return ActionOutcome::rejected("invalid position");
        }
        let (row, col) = (row as usize, col as usize);
        if self.board[row][col] != 0 {
            return ActionOutcome::rejected("cell occupied");
        }

        let Some(color) = self.color_of(user) else {
            return ActionOutcome::rejected("not a player in this game");
        };
        self.board[row][col] = color;
        self.history.push((row, col, color));

        let winner_color = self.check_winner(row, col);
        self.switch_player();

        let mut broadcast = json!({
            "type": "game_action",
            "action": "move",
            "row": row,
            "col": col,
            "player": color,
            "player_id": user,
            "next_player": self.current_player,
            "frame_id": self.history.len(),
        });

        if let Some(winner_color) = winner_color {
            self.winner = Some(user);
            self.is_finished = true;
            broadcast["game_over"] = json!(true);
            broadcast["winner"] = json!(user);
            broadcast["winner_color"] = json!(winner_color);
        } else if self.is_board_full() {
            self.is_finished = true;
            broadcast["game_over"] = json!(true);
            broadcast["winner"] = Value::Null;
        }

        ActionOutcome::accepted_broadcast(broadcast)
    }

    fn get_state(&self) -> Value {
        json!({
            "board": self.board,
            "current_player": self.current_player,
            "player_colors": self.player_colors_json(),
            "winner": self.winner,
            "is_finished": self.is_finished,
            "frame_id": self.history.len(),
        })
    }

    fn check_game_over(&self) -> Option<GameResult> {
        if !self.is_finished {
            return None;
        }
        let mut scores = std::collections::HashMap::new();
        for (user, _) in &self.player_colors {
            let score = if Some(*user) == self.winner {
                100
            } else if self.winner.is_none() {
                50
            } else {
                0
            };
            scores.insert(*user, score);
        }
        Some(GameResult {
            winner: self.winner,
            scores,
            stats: json!({
                "total_moves": self.history.len(),
                "board": self.board,
            }),
        })
    }

    fn handle_disconnect(&mut self, user: UserId) -> Option<Value> {
        if self.color_of(user).is_none() || self.is_finished {
            return Some(json!({"disconnected": user}));
        }
        let winner = self.other_player(user);
        self.winner = winner;
        self.is_finished = true;
        // Leave emitting `game_end` to the room actor's `finish_game` path
        // (driven by `check_game_over`) so disconnect forfeits go through
        // the same single broadcast as every other game type.
        Some(json!({"disconnected": user}))
    }

    fn is_finished(&self) -> bool {
        self.is_finished
    }

    fn frame_id(&self) -> u64 {
        self.history.len() as u64
    }
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

    fn mv(game: &mut GomokuGame, user: UserId, row: i64, col: i64) -> ActionOutcome {
        game.process_action(user, "move", &json!({"row": row, "col": col}))
    }

    #[test]
    fn test_first_player_is_black_and_current() {
        let game = GomokuGame::new(&players());
        assert_eq!(game.current_player, Some(UserId(1)));
        assert_eq!(game.color_of(UserId(1)), Some(1));
    }

    #[test]
    fn test_move_out_of_turn_is_rejected() {
        let mut game = GomokuGame::new(&players());
        let outcome = mv(&mut game, UserId(2), 7, 7);
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_move_out_of_bounds_is_rejected() {
        let mut game = GomokuGame::new(&players());
        let outcome = mv(&mut game, UserId(1), 99, 0);
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_move_on_occupied_cell_is_rejected() {
        let mut game = GomokuGame::new(&players());
        mv(&mut game, UserId(1), 7, 7);
        mv(&mut game, UserId(2), 8, 8);
        let outcome = mv(&mut game, UserId(1), 7, 7);
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_five_in_a_row_wins() {
        let mut game = GomokuGame::new(&players());
        // alice plays a horizontal five; bob plays off to the side.
        let moves = [
            (UserId(1), 7, 7),
            (UserId(2), 8, 8),
            (UserId(1), 7, 8),
            (UserId(2), 8, 9),
            (UserId(1), 7, 6),
            (UserId(2), 8, 10),
            (UserId(1), 7, 9),
            (UserId(2), 8, 11),
            (UserId(1), 7, 5),
        ];
        let mut last = ActionOutcome::rejected("init");
        for (user, row, col) in moves {
            last = mv(&mut game, user, row, col);
        }
        assert!(last.accepted);
        assert!(game.is_finished());
        assert_eq!(game.check_game_over().unwrap().winner, Some(UserId(1)));
    }

    #[test]
    fn test_surrender_awards_remaining_player() {
        let mut game = GomokuGame::new(&players());
        let outcome = game.process_action(UserId(1), "surrender", &json!({}));
        assert!(outcome.accepted);
        assert!(game.is_finished());
        assert_eq!(game.check_game_over().unwrap().winner, Some(UserId(2)));
    }

    #[test]
    fn test_disconnect_forfeits_to_remaining_player() {
        let mut game = GomokuGame::new(&players());
        mv(&mut game, UserId(1), 0, 0);
        let envelope = game.handle_disconnect(UserId(2)).unwrap();
        assert_eq!(envelope["disconnected"], UserId(2).0);
        assert!(game.is_finished());
        assert_eq!(game.check_game_over().unwrap().winner, Some(UserId(1)));
    }
}
