//! Nonce and session storage.
//!
//! The engine talks to the [`NonceStore`] and [`SessionStore`] traits. Two
//! backends implement both:
//! - [`redis_store::RedisStore`]: durable, shared between processes
//! - [`memory::MemoryStore`]: in-process, for development and tests

pub mod memory;
pub mod redis_store;

use crate::models::{Nonce, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// How long a nonce record outlives its expiry, so late replays are reported
/// as `AlreadyUsed`/`Expired` rather than `NotFound`.
pub const NONCE_RETENTION: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Why a nonce could not be consumed.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("Nonce not found")]
    NotFound,

    #[error("Nonce already used")]
    AlreadyUsed,

    #[error("Nonce expired")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Persist a freshly issued, unconsumed nonce.
    async fn insert_nonce(&self, nonce: &Nonce) -> Result<(), StoreError>;

    /// Check `exists && !consumed && now < expires_at` and mark the nonce
    /// consumed, as one atomic step.
    async fn try_consume_nonce(&self, value: &str, now: DateTime<Utc>)
        -> Result<(), ConsumeError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    /// The stored record, expired or not. Expiry is the caller's decision.
    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Returns true if a record was deleted.
    async fn delete_session(&self, id: &str) -> Result<bool, StoreError>;
}

/// Seconds until `at`, at least one. Used for key TTLs.
pub(crate) fn ttl_secs_until(at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (at - now).num_seconds().max(1) as u64
}
