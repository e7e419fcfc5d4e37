//! Session lifecycle: create after a verified proof, resolve per request,
//! revoke on logout. Expiry is lazy; an expired record reads as absent.

use crate::auth::address::Address;
use crate::auth::token::generate_session_id;
use crate::models::{expiry_after, Session};
use crate::storage::{SessionStore, StoreError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        SessionManager { store }
    }

    pub async fn create(
        &self,
        address: Address,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let session = Session {
            id: generate_session_id(),
            address,
            expires_at: expiry_after(now, ttl),
        };
        self.store.insert_session(&session).await?;
        Ok(session)
    }

    /// The bound address, or `None` if the session is unknown or expired.
    pub async fn resolve(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Address>, StoreError> {
        Ok(self
            .store
            .get_session(session_id)
            .await?
            .filter(|s| !s.is_expired(now))
            .map(|s| s.address))
    }

    /// Delete the session. Revoking an unknown id is not an error.
    pub async fn revoke(&self, session_id: &str) -> Result<(), StoreError> {
        self.store.delete_session(session_id).await?;
        Ok(())
    }
}
