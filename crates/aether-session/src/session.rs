//! The live transport record (§3 `Session`).

use std::collections::HashSet;
use std::time::Instant;

use tokio::sync::mpsc;

use aether_protocol::{OutboundEnvelope, SessionId, UserId};

use crate::UserSession;

/// Something delivered to a session's connection-handler task. The handler
/// owns the real transport and drains this channel in its `select!` loop,
/// writing envelopes out and acting on administrative signals.
#[derive(Debug, Clone)]
pub enum ConnEvent {
    /// Write this envelope out to the client.
    Send(OutboundEnvelope),
    /// Force-close the transport with a close code and human reason —
    /// used for "replaced by another session" (1001) and capacity (1013).
    Close { code: u16, reason: String },
}

/// Per-live-transport record, owned exclusively by the
/// [`ConnectionRegistry`](crate::ConnectionRegistry) (§3, §4.1).
pub struct Session {
    pub id: SessionId,
    /// `None` until `login`/`token_login` succeeds.
    pub user_id: Option<UserId>,
    pub user_session: Option<UserSession>,
    pub last_heartbeat: Instant,
    pub channels: HashSet<String>,
    /// Mailbox the owning connection-handler task drains.
    pub sender: mpsc::UnboundedSender<ConnEvent>,
}

impl Session {
    pub fn new(id: SessionId, sender: mpsc::UnboundedSender<ConnEvent>) -> Self {
        Self {
            id,
            user_id: None,
            user_session: None,
            last_heartbeat: Instant::now(),
            channels: HashSet::new(),
            sender,
        }
    }

    pub fn authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn touch_heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    /// Best-effort delivery — a dropped handler task (transport already
    /// gone) must not abort the caller's fan-out (§4.1).
    pub fn deliver(&self, event: ConnEvent) {
        let _ = self.sender.send(event);
    }
}
