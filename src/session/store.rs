//! Session store abstraction.
//!
//! The gateway treats session storage as an external collaborator: it reads
//! session state and issues touch/destroy requests, nothing more. Any backing
//! technology can sit behind this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// State bound to a session token.
#[derive(Debug, Clone)]
pub struct SessionData {
    /// Identifier of the logged-in user. `None` for anonymous sessions,
    /// which the access guard treats identically to no session at all.
    pub user_id: Option<String>,

    /// Email of the logged-in user, when known.
    pub email: Option<String>,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session expires. Extended by `touch`.
    pub expires_at: DateTime<Utc>,
}

/// Error type for session store operations.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session not found")]
    NotFound,

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Abstract session store: create / lookup / touch / destroy.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session bound to a user, returning the new opaque token.
    async fn create(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<String, SessionStoreError>;

    /// Resolve a token to its session state. Expired or unknown tokens
    /// resolve to `None`; only infrastructure failures are errors.
    async fn lookup(&self, token: &str) -> Result<Option<SessionData>, SessionStoreError>;

    /// Extend the session's expiry by the store's TTL.
    /// Callers treat this as best-effort keep-alive.
    async fn touch(&self, token: &str) -> Result<(), SessionStoreError>;

    /// Remove the session. Destroying an unknown token is not an error.
    async fn destroy(&self, token: &str) -> Result<(), SessionStoreError>;
}
