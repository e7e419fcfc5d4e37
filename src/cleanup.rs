//! Background sweep for the in-process store.
//!
//! Expiry is enforced lazily on every read, so this job only bounds memory:
//! nonces nobody redeemed and sessions nobody logged out of would otherwise
//! stay in the maps forever. Redis expires its own keys and needs no sweep.

use crate::storage::MemoryStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Run the cleanup loop, purging expired records every `interval`.
pub async fn run_cleanup_loop(store: Arc<MemoryStore>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        sweep(&store);
    }
}

/// Purge expired records once. Returns `(nonces, sessions)` removed.
pub fn sweep(store: &MemoryStore) -> (usize, usize) {
    let (nonces, sessions) = store.purge_expired(Utc::now());

    if nonces > 0 || sessions > 0 {
        tracing::info!(
            nonces,
            sessions,
            remaining_nonces = store.nonce_count(),
            remaining_sessions = store.session_count(),
            "Cleanup job completed"
        );
    }

    (nonces, sessions)
}
