//! Connection registry, user store, and auth service for Aether Party.
//!
//! This crate owns everything above the wire transport and below the
//! room layer:
//!
//! 1. **Authentication** — credential verification and bearer tokens
//!    ([`AuthService`], [`UserStore`])
//! 2. **Durable identity** — accounts, stats, presence ([`User`], [`UserSession`])
//! 3. **Live connections** — the session↔user↔room↔channel mappings and
//!    fan-out sends ([`ConnectionRegistry`], [`Session`], [`ConnEvent`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)    ← routes game actions; asks the registry who's in a room
//!     ↕
//! Session Layer (this crate)  ← owns identity, auth, and connection fan-out
//!     ↕
//! Protocol Layer (below) ← provides UserId, SessionId, RoomId, envelopes
//! ```

mod auth;
mod error;
mod registry;
mod session;
mod user;

pub use auth::{AuthService, UserStore};
pub use error::SessionError;
pub use registry::ConnectionRegistry;
pub use session::{ConnEvent, Session};
pub use user::{User, UserSession, UserStatus};
