//! In-memory session store.
//!
//! # Responsibilities
//! - Issue opaque UUID tokens bound to session state
//! - Enforce TTL on lookup (expired records resolve to None)
//! - Sweep expired records periodically in the background
//!
//! # Design Decisions
//! - DashMap for lock-free concurrent access; no lock is held across await
//! - Touch is last-write-wins on expiry, safe to interleave across requests
//! - The sweeper mirrors the auto-remove interval the original store used

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::session::store::{SessionData, SessionStore, SessionStoreError};

/// DashMap-backed session store with TTL.
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionData>,
    ttl: Duration,
}

impl MemorySessionStore {
    /// Create a store whose sessions live for `ttl_secs` after creation
    /// or the most recent touch.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Create a session with no bound user. The access guard rejects these;
    /// they exist because stores commonly hold pre-login sessions.
    pub fn create_anonymous(&self) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.sessions.insert(
            token.clone(),
            SessionData {
                user_id: None,
                email: None,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Number of live records, including not-yet-swept expired ones.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, data| data.expires_at > now);
        before - self.sessions.len()
    }

    /// Run the expiry sweeper until shutdown is signalled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval_secs: u64,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = self.sweep_expired();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = self.len(), "Swept expired sessions");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Session sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<String, SessionStoreError> {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.sessions.insert(
            token.clone(),
            SessionData {
                user_id: Some(user_id.to_string()),
                email: email.map(str::to_string),
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
        Ok(token)
    }

    async fn lookup(&self, token: &str) -> Result<Option<SessionData>, SessionStoreError> {
        let now = Utc::now();
        if let Some(entry) = self.sessions.get(token) {
            if entry.expires_at > now {
                return Ok(Some(entry.value().clone()));
            }
        }
        // The read guard is released above; removal re-checks expiry so a
        // concurrent touch that just revived the session is not lost.
        self.sessions.remove_if(token, |_, data| data.expires_at <= now);
        Ok(None)
    }

    async fn touch(&self, token: &str) -> Result<(), SessionStoreError> {
        match self.sessions.get_mut(token) {
            Some(mut entry) => {
                entry.expires_at = Utc::now() + self.ttl;
                Ok(())
            }
            None => Err(SessionStoreError::NotFound),
        }
    }

    async fn destroy(&self, token: &str) -> Result<(), SessionStoreError> {
        self.sessions.remove(token);
        Ok(())
    }
}
