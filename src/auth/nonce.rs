//! Issuing and consuming one-time challenge nonces.

use crate::auth::token::{generate_nonce, redact};
use crate::models::{expiry_after, Nonce};
use crate::storage::{ConsumeError, NonceStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct NonceManager {
    store: Arc<dyn NonceStore>,
}

impl NonceManager {
    pub fn new(store: Arc<dyn NonceStore>) -> Self {
        NonceManager { store }
    }

    /// Generate and persist an unconsumed nonce valid for `ttl` from `now`.
    pub async fn issue(&self, ttl: Duration, now: DateTime<Utc>) -> Result<Nonce, StoreError> {
        let nonce = Nonce {
            value: generate_nonce(),
            expires_at: expiry_after(now, ttl),
            consumed: false,
        };
        self.store.insert_nonce(&nonce).await?;
        Ok(nonce)
    }

    /// Consume `value` if it exists, is unused and unexpired.
    ///
    /// This is the only access path to a nonce during verification: there is
    /// no separate lookup to race against.
    pub async fn try_consume(&self, value: &str, now: DateTime<Utc>) -> Result<(), ConsumeError> {
        let result = self.store.try_consume_nonce(value, now).await;
        if let Err(e) = &result {
            tracing::warn!(action = "nonce_rejected", nonce = %redact(value), reason = %e, "Nonce rejected");
        }
        result
    }
}
