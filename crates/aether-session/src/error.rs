//! Error types for the session layer (§7 auth/session error taxonomy).

use aether_protocol::SessionId;

/// Errors raised by the connection registry and auth service.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `login`/`token_login` rejected the supplied credentials or token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// A request that requires auth arrived on a session that hasn't
    /// logged in yet (router maps this to error code 4003).
    #[error("authentication required")]
    AuthRequired,

    /// `register` was called with a name that's already taken.
    #[error("username {0} is already registered")]
    NameTaken(String),

    /// No session exists for the given id — it was never registered, or
    /// was already removed (disconnect raced a request).
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The bearer token failed HMAC verification or has expired.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The connection registry is full; the transport must be closed
    /// with close code 1013 (§4.1, §6.1).
    #[error("server at capacity")]
    AtCapacity(u16),
}
