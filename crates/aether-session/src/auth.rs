//! Credential verification and bearer-token issuance (§4.3).
//!
//! Passwords are hashed with argon2id; bearer tokens are a signed,
//! self-contained `user_id:expiry` pair authenticated with HMAC-SHA256 —
//! no server-side token table to expire or garbage-collect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;

use aether_protocol::UserId;

use crate::{SessionError, User};

type HmacSha256 = Hmac<Sha256>;

/// How long an issued bearer token remains valid (§4.3).
const TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// In-memory durable user store. A real deployment would back this with
/// a database; the interface is narrow enough to swap out (§1 Non-goals:
/// persistence backend is out of scope).
#[derive(Default)]
pub struct UserStore {
    users: HashMap<UserId, User>,
    names: HashMap<String, UserId>,
    next_id: AtomicU64,
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
            names: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&mut self, name: String, password_hash: String) -> UserId {
        let id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.names.insert(name.clone(), id);
        self.users.insert(id, User::new(id, name.clone(), name, password_hash));
        id
    }

    pub fn by_name(&self, name: &str) -> Option<&User> {
        self.names.get(name).and_then(|id| self.users.get(id))
    }

    pub fn by_id(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn by_id_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }
}

/// Stateless-token auth on top of [`UserStore`] (§4.3).
pub struct AuthService {
    store: RwLock<UserStore>,
    hmac_key: Vec<u8>,
}

impl AuthService {
    pub fn new(hmac_key: impl Into<Vec<u8>>) -> Self {
        Self {
            store: RwLock::new(UserStore::new()),
            hmac_key: hmac_key.into(),
        }
    }

    /// Registers a new account; fails if the name is taken (§4.3 `register`).
    pub async fn register(
        &self,
        name: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserId, SessionError> {
        let mut store = self.store.write().await;
        if store.by_name(name).is_some() {
            return Err(SessionError::NameTaken(name.to_string()));
        }
        let hash = hash_password(password)
            .map_err(|e| SessionError::AuthFailed(format!("could not hash password: {e}")))?;
        let id = store.insert(name.to_string(), hash);
        if let Some(display) = display_name {
            if let Some(user) = store.by_id_mut(id) {
                user.display_name = display.to_string();
            }
        }
        tracing::info!(%id, name, "user registered");
        Ok(id)
    }

    /// Verifies name/password and returns the user id plus a fresh bearer
    /// token (§4.3 `login`).
    pub async fn login(
        &self,
        name: &str,
        password: &str,
    ) -> Result<(UserId, String), SessionError> {
        let mut store = self.store.write().await;
        let user = store
            .by_name(name)
            .ok_or_else(|| SessionError::AuthFailed("unknown username or password".into()))?;
        if !verify_password(password, &user.password_hash) {
            return Err(SessionError::AuthFailed("unknown username or password".into()));
        }
        let id = user.id;
        if let Some(user) = store.by_id_mut(id) {
            user.last_login = Some(now_unix());
        }
        let token = self.issue_token(id);
        Ok((id, token))
    }

    /// Verifies a bearer token's signature and expiry (§4.3 `token_login`).
    pub async fn token_login(&self, token: &str) -> Result<UserId, SessionError> {
        let id = self.verify_token(token)?;
        let store = self.store.read().await;
        if store.by_id(id).is_none() {
            return Err(SessionError::InvalidToken);
        }
        Ok(id)
    }

    /// Looks up a user snapshot for profile responses.
    pub async fn user(&self, id: UserId) -> Option<User> {
        self.store.read().await.by_id(id).cloned()
    }

    /// Applies end-of-game persistent effects (§4.4.4 step 5).
    pub async fn apply_game_result(&self, id: UserId, won: bool, score: u64) {
        if let Some(user) = self.store.write().await.by_id_mut(id) {
            user.apply_game_result(won, score);
        }
    }

    fn issue_token(&self, id: UserId) -> String {
        let expiry = now_unix() + TOKEN_TTL_SECS;
        let payload = format!("{}:{}", id.0, expiry);
        let sig = self.sign(payload.as_bytes());
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(sig)
        )
    }

    fn verify_token(&self, token: &str) -> Result<UserId, SessionError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::InvalidToken)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| SessionError::InvalidToken)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| SessionError::InvalidToken)?;
        let expected = self.sign(&payload);
        if expected.len() != sig.len() || !constant_time_eq(&expected, &sig) {
            return Err(SessionError::InvalidToken);
        }
        let payload = String::from_utf8(payload).map_err(|_| SessionError::InvalidToken)?;
        let (id_str, expiry_str) = payload.split_once(':').ok_or(SessionError::InvalidToken)?;
        let id: u64 = id_str.parse().map_err(|_| SessionError::InvalidToken)?;
        let expiry: u64 = expiry_str.parse().map_err(|_| SessionError::InvalidToken)?;
        if now_unix() > expiry {
            return Err(SessionError::InvalidToken);
        }
        Ok(UserId(id))
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_key).expect("HMAC accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::rng());
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the epoch")
        .as_secs()
}
