//! In-process store over `dashmap`.
//!
//! Consumption runs while holding the entry's shard write lock, so concurrent
//! attempts on one nonce are linearized and exactly one wins.

use super::{ConsumeError, NonceStore, SessionStore, StoreError, NONCE_RETENTION};
use crate::models::{Nonce, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryStore {
    nonces: DashMap<String, Nonce>,
    sessions: DashMap<String, Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop sessions past expiry and nonces past expiry plus retention.
    ///
    /// Returns `(nonces_removed, sessions_removed)`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> (usize, usize) {
        let retention = chrono::Duration::from_std(NONCE_RETENTION).unwrap_or_default();

        let nonces_before = self.nonces.len();
        self.nonces.retain(|_, n| now < n.expires_at + retention);
        let sessions_before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));

        (
            nonces_before.saturating_sub(self.nonces.len()),
            sessions_before.saturating_sub(self.sessions.len()),
        )
    }

    pub fn nonce_count(&self) -> usize {
        self.nonces.len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl NonceStore for MemoryStore {
    async fn insert_nonce(&self, nonce: &Nonce) -> Result<(), StoreError> {
        self.nonces.insert(nonce.value.clone(), nonce.clone());
        Ok(())
    }

    async fn try_consume_nonce(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ConsumeError> {
        let mut entry = self.nonces.get_mut(value).ok_or(ConsumeError::NotFound)?;
        if entry.consumed {
            return Err(ConsumeError::AlreadyUsed);
        }
        if now >= entry.expires_at {
            return Err(ConsumeError::Expired);
        }
        entry.consumed = true;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(id).is_some())
    }
}
