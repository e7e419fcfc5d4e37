//! Request and response models for the API, and the records kept by the stores.

use crate::auth::address::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Request for a sign-in challenge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub address: String,
    pub chain_id: u64,
    pub origin: String,
}

/// Challenge the wallet must sign verbatim.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub nonce: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

/// Signed challenge submitted for verification.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub message: String,
    pub signature: String, // hex, 0x-prefixed
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub address: String,
}

// ============================================================================
// Storage Models
// ============================================================================

/// One-time challenge token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    pub value: String, // hex
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

/// Server-side session bound to a verified address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub address: Address,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// `now + ttl`, saturating at the latest representable time.
pub fn expiry_after(now: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
