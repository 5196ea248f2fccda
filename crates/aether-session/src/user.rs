//! Durable user identity and presence (§3 `User`, `UserSession`).

use serde::{Deserialize, Serialize};

use aether_protocol::{RoomId, UserId};

/// A durable user identity, owned by the [`UserStore`](crate::UserStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub display_name: String,
    pub avatar: String,
    /// Salted+hashed password (argon2 PHC string). Never serialized outbound.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub level: u32,
    pub exp: u64,
    pub coins: u64,
    pub skill_rating: i32,
    pub games_played: u64,
    pub games_won: u64,
    /// Static friend list (§1 Non-goals: no rich friends graph).
    pub friends: Vec<UserId>,
    pub last_login: Option<u64>,
}

impl User {
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        display_name: impl Into<String>,
        password_hash: String,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            display_name: display_name.into(),
            avatar: "default".into(),
            password_hash,
            level: 1,
            exp: 0,
            coins: 100,
            skill_rating: 1000,
            games_played: 0,
            games_won: 0,
            friends: Vec::new(),
            last_login: None,
        }
    }

    /// Applies the end-of-game persistent side effects (§4.4.4 step 5):
    /// +50 coins and +score exp on a win; games_played always increments.
    pub fn apply_game_result(&mut self, won: bool, score: u64) {
        self.games_played += 1;
        self.exp += score;
        if won {
            self.games_won += 1;
            self.coins += 50;
        }
        while self.exp >= self.level as u64 * 1000 {
            self.exp -= self.level as u64 * 1000;
            self.level += 1;
        }
    }

    pub fn profile_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "user_id": self.id,
            "name": self.name,
            "display_name": self.display_name,
            "avatar": self.avatar,
            "level": self.level,
            "exp": self.exp,
            "coins": self.coins,
            "skill_rating": self.skill_rating,
            "games_played": self.games_played,
            "games_won": self.games_won,
        })
    }
}

/// Presence status attached to a session on successful login (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Online,
    InRoom,
    InGame,
    Away,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::InRoom => "in_room",
            Self::InGame => "in_game",
            Self::Away => "away",
        }
    }
}

/// A presence record bound to a [`Session`](crate::Session) after login.
/// Lifetime equals the session's lifetime (§3).
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: UserId,
    pub status: UserStatus,
    pub current_room: Option<RoomId>,
    /// The game type running in `current_room`, once a match has started
    /// (§3). Cleared alongside `current_room` on room exit.
    pub current_game: Option<String>,
    pub client_platform: Option<String>,
    pub client_version: Option<String>,
}

impl UserSession {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            status: UserStatus::Online,
            current_room: None,
            current_game: None,
            client_platform: None,
            client_version: None,
        }
    }
}
