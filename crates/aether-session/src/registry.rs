//! The connection registry (§4.1): the sole writer of session↔user,
//! session↔room, and session↔channel mappings.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use aether_protocol::{CloseCode, OutboundEnvelope, RoomId, SessionId, UserId};

use crate::{ConnEvent, Session, SessionError, UserSession};

/// Tracks every live session and the room/channel/user mappings derived
/// from it. Guarded by a single async mutex at the call site (§5: "one
/// mutex per shared aggregate" is a conformant choice).
pub struct ConnectionRegistry {
    sessions: HashMap<SessionId, Session>,
    user_sessions: HashMap<UserId, SessionId>,
    room_sessions: HashMap<RoomId, HashSet<SessionId>>,
    channel_sessions: HashMap<String, HashSet<SessionId>>,
    next_session_id: u64,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            user_sessions: HashMap::new(),
            room_sessions: HashMap::new(),
            channel_sessions: HashMap::new(),
            next_session_id: 1,
            max_connections,
        }
    }

    /// Registers a fresh transport. Rejects at capacity with the
    /// transport-level close code 1013 (§4.1, §6.1).
    pub fn register(
        &mut self,
        sender: mpsc::UnboundedSender<ConnEvent>,
    ) -> Result<SessionId, SessionError> {
        if self.sessions.len() >= self.max_connections {
            return Err(SessionError::AtCapacity(CloseCode::ServerAtCapacity.code()));
        }
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;
        self.sessions.insert(id, Session::new(id, sender));
        tracing::info!(session_id = %id, "session registered");
        Ok(id)
    }

    /// Binds an authenticated user to a session. If the user already has a
    /// live session, that prior session receives a "replaced" error and is
    /// closed, then the mapping is overwritten (§4.1).
    pub fn bind_user(
        &mut self,
        session_id: SessionId,
        user_id: UserId,
        user_session: UserSession,
    ) -> Result<(), SessionError> {
        if let Some(&prior) = self.user_sessions.get(&user_id) {
            if prior != session_id {
                if let Some(prior_session) = self.sessions.get(&prior) {
                    prior_session.deliver(ConnEvent::Send(OutboundEnvelope::new(
                        "error",
                        serde_json::json!({
                            "code": CloseCode::ReplacedSession.code(),
                            "message": "logged in elsewhere",
                        }),
                    )));
                    prior_session.deliver(ConnEvent::Close {
                        code: CloseCode::ReplacedSession.code(),
                        reason: "logged in elsewhere".into(),
                    });
                }
                tracing::info!(%user_id, old = %prior, new = %session_id, "session replaced");
            }
        }
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::NotFound(session_id))?;
        session.user_id = Some(user_id);
        session.user_session = Some(user_session);
        self.user_sessions.insert(user_id, session_id);
        Ok(())
    }

    /// Clears auth binding and channel/room subscriptions without closing
    /// the transport (§4.3 `logout`).
    pub fn unbind_user(&mut self, session_id: SessionId) {
        let channels: Vec<String> = self
            .sessions
            .get(&session_id)
            .map(|s| s.channels.iter().cloned().collect())
            .unwrap_or_default();
        for ch in channels {
            self.unsubscribe_channel(session_id, &ch);
        }
        if let Some(session) = self.sessions.get_mut(&session_id) {
            if let Some(uid) = session.user_id.take() {
                if self.user_sessions.get(&uid) == Some(&session_id) {
                    self.user_sessions.remove(&uid);
                }
            }
            session.user_session = None;
        }
    }

    /// Removes the session entirely (transport closed or heartbeat reap).
    pub fn remove(&mut self, session_id: SessionId) -> Option<Session> {
        self.unbind_user(session_id);
        for set in self.room_sessions.values_mut() {
            set.remove(&session_id);
        }
        self.room_sessions.retain(|_, set| !set.is_empty());
        let session = self.sessions.remove(&session_id);
        if session.is_some() {
            tracing::info!(session_id = %session_id, "session removed");
        }
        session
    }

    pub fn join_room(&mut self, session_id: SessionId, room_id: RoomId) {
        self.room_sessions.entry(room_id).or_default().insert(session_id);
    }

    pub fn leave_room(&mut self, session_id: SessionId, room_id: RoomId) {
        if let Some(set) = self.room_sessions.get_mut(&room_id) {
            set.remove(&session_id);
            if set.is_empty() {
                self.room_sessions.remove(&room_id);
            }
        }
    }

    pub fn subscribe_channel(&mut self, session_id: SessionId, channel: impl Into<String>) {
        let channel = channel.into();
        self.channel_sessions
            .entry(channel.clone())
            .or_default()
            .insert(session_id);
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.channels.insert(channel);
        }
    }

    pub fn unsubscribe_channel(&mut self, session_id: SessionId, channel: &str) {
        if let Some(set) = self.channel_sessions.get_mut(channel) {
            set.remove(&session_id);
            if set.is_empty() {
                self.channel_sessions.remove(channel);
            }
        }
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.channels.remove(channel);
        }
    }

    /// Sends to one session directly.
    pub fn send_to_session(&self, session_id: SessionId, envelope: OutboundEnvelope) {
        if let Some(session) = self.sessions.get(&session_id) {
            session.deliver(ConnEvent::Send(envelope));
        }
    }

    /// Sends to a user's current session, if any.
    pub fn send_to_user(&self, user_id: UserId, envelope: OutboundEnvelope) {
        if let Some(&sid) = self.user_sessions.get(&user_id) {
            self.send_to_session(sid, envelope);
        }
    }

    /// Fans an envelope out to every session in a room. Takes a snapshot
    /// of the recipient set so the caller needn't hold a lock across the
    /// per-recipient sends (§4.1) — sends here are just mailbox pushes, so
    /// this method is synchronous and the snapshot requirement is
    /// trivially satisfied; kept as a method so callers never touch the
    /// maps directly.
    pub fn send_to_room(&self, room_id: RoomId, envelope: OutboundEnvelope) {
        if let Some(set) = self.room_sessions.get(&room_id) {
            for &sid in set {
                self.send_to_session(sid, envelope.clone());
            }
        }
    }

    pub fn send_to_room_except(
        &self,
        room_id: RoomId,
        exclude: SessionId,
        envelope: OutboundEnvelope,
    ) {
        if let Some(set) = self.room_sessions.get(&room_id) {
            for &sid in set {
                if sid != exclude {
                    self.send_to_session(sid, envelope.clone());
                }
            }
        }
    }

    pub fn send_to_channel(&self, channel: &str, envelope: OutboundEnvelope) {
        if let Some(set) = self.channel_sessions.get(channel) {
            for &sid in set {
                self.send_to_session(sid, envelope.clone());
            }
        }
    }

    pub fn broadcast(&self, envelope: OutboundEnvelope) {
        for session in self.sessions.values() {
            if session.authenticated() {
                session.deliver(ConnEvent::Send(envelope.clone()));
            }
        }
    }

    pub fn touch_heartbeat(&mut self, session_id: SessionId) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.touch_heartbeat();
        }
    }

    /// Returns sessions whose last heartbeat exceeds `timeout` (§4.1 `reap`).
    pub fn stale_sessions(&self, timeout: Duration) -> Vec<SessionId> {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|(_, s)| now.duration_since(s.last_heartbeat) > timeout)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn user_id_of(&self, session_id: SessionId) -> Option<UserId> {
        self.sessions.get(&session_id).and_then(|s| s.user_id)
    }

    pub fn session_of_user(&self, user_id: UserId) -> Option<SessionId> {
        self.user_sessions.get(&user_id).copied()
    }

    pub fn user_session_mut(&mut self, session_id: SessionId) -> Option<&mut UserSession> {
        self.sessions.get_mut(&session_id).and_then(|s| s.user_session.as_mut())
    }

    pub fn user_session(&self, session_id: SessionId) -> Option<&UserSession> {
        self.sessions.get(&session_id).and_then(|s| s.user_session.as_ref())
    }

    pub fn is_authenticated(&self, session_id: SessionId) -> bool {
        self.sessions.get(&session_id).map(|s| s.authenticated()).unwrap_or(false)
    }

    /// Every currently-registered session id, for broadcast-style sweeps
    /// (e.g. graceful shutdown) that need to iterate without borrowing the
    /// session map itself.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(100)
    }

    fn mailbox() -> (mpsc::UnboundedSender<ConnEvent>, mpsc::UnboundedReceiver<ConnEvent>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_register_assigns_unique_ids() {
        let mut reg = registry();
        let (tx1, _rx1) = mailbox();
        let (tx2, _rx2) = mailbox();
        let a = reg.register(tx1).unwrap();
        let b = reg.register(tx2).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_register_rejects_at_capacity() {
        let mut reg = ConnectionRegistry::new(1);
        let (tx1, _rx1) = mailbox();
        let (tx2, _rx2) = mailbox();
        reg.register(tx1).unwrap();
        let err = reg.register(tx2).unwrap_err();
        assert!(matches!(err, SessionError::AtCapacity(1013)));
    }

    #[test]
    fn test_bind_user_replaces_prior_session() {
        let mut reg = registry();
        let (tx1, mut rx1) = mailbox();
        let (tx2, _rx2) = mailbox();
        let s1 = reg.register(tx1).unwrap();
        let s2 = reg.register(tx2).unwrap();

        reg.bind_user(s1, UserId(1), UserSession::new(UserId(1))).unwrap();
        reg.bind_user(s2, UserId(1), UserSession::new(UserId(1))).unwrap();

        let first = rx1.try_recv().expect("s1 should get a replaced-session error");
        assert!(matches!(first, ConnEvent::Send(_)));
        let second = rx1.try_recv().expect("s1 should get a close signal");
        assert!(matches!(second, ConnEvent::Close { code: 1001, .. }));
        assert_eq!(reg.session_of_user(UserId(1)), Some(s2));
    }

    #[test]
    fn test_join_and_leave_room_tracks_membership() {
        let mut reg = registry();
        let (tx, _rx) = mailbox();
        let s = reg.register(tx).unwrap();
        reg.join_room(s, RoomId(1));
        reg.send_to_room(RoomId(1), OutboundEnvelope::new("x", serde_json::json!({})));
        reg.leave_room(s, RoomId(1));
        assert!(reg.room_sessions.get(&RoomId(1)).is_none());
    }

    #[test]
    fn test_stale_sessions_detects_timeout() {
        let mut reg = registry();
        let (tx, _rx) = mailbox();
        let s = reg.register(tx).unwrap();
        if let Some(session) = reg.sessions.get_mut(&s) {
            session.last_heartbeat = Instant::now() - Duration::from_secs(120);
        }
        let stale = reg.stale_sessions(Duration::from_secs(60));
        assert_eq!(stale, vec![s]);
    }

    #[test]
    fn test_unbind_user_clears_channels() {
        let mut reg = registry();
        let (tx, _rx) = mailbox();
        let s = reg.register(tx).unwrap();
        reg.bind_user(s, UserId(1), UserSession::new(UserId(1))).unwrap();
        reg.subscribe_channel(s, "lobby");
        reg.unbind_user(s);
        assert!(!reg.is_authenticated(s));
        assert!(reg.channel_sessions.get("lobby").is_none());
    }
}
