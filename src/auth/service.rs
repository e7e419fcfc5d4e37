//! The authentication engine: challenge issuance, proof verification and
//! session lookup, composed over the nonce store, session store and chain.

use crate::auth::address::Address;
use crate::auth::chain::ChainClient;
use crate::auth::message::ChallengeMessage;
use crate::auth::nonce::NonceManager;
use crate::auth::session::SessionManager;
use crate::auth::token::redact;
use crate::auth::verify::SignatureVerifier;
use crate::config::Config;
use crate::error::AuthError;
use crate::models::{ChallengeResponse, Session};
use crate::storage::{NonceStore, SessionStore};
use chrono::{SubsecRound, Utc};
use std::sync::Arc;

/// Version written into every challenge.
pub const CHALLENGE_VERSION: &str = "1";

#[derive(Clone)]
pub struct AuthService {
    config: Arc<Config>,
    nonces: NonceManager,
    sessions: SessionManager,
    verifier: SignatureVerifier,
}

impl AuthService {
    pub fn new(
        config: Arc<Config>,
        nonce_store: Arc<dyn NonceStore>,
        session_store: Arc<dyn SessionStore>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        AuthService {
            config,
            nonces: NonceManager::new(nonce_store),
            sessions: SessionManager::new(session_store),
            verifier: SignatureVerifier::new(chain),
        }
    }

    /// Issue a nonce and the challenge text the wallet must sign verbatim.
    ///
    /// Chain and origin are checked before anything is stored.
    pub async fn request_challenge(
        &self,
        address: &str,
        chain_id: u64,
        origin: &str,
    ) -> Result<ChallengeResponse, AuthError> {
        if chain_id != self.config.chain_id {
            return Err(AuthError::ChainMismatch {
                expected: self.config.chain_id,
                got: chain_id,
            });
        }
        if !origin.starts_with(&self.config.origin) {
            return Err(AuthError::OriginMismatch);
        }
        let address: Address = address.parse()?;

        let now = Utc::now().trunc_subsecs(0);
        let nonce = self.nonces.issue(self.config.nonce_ttl(), now).await?;

        let challenge = ChallengeMessage {
            domain: self.config.domain.clone(),
            address,
            statement: self.config.statement.clone(),
            uri: self.config.origin.clone(),
            version: CHALLENGE_VERSION.to_string(),
            chain_id: self.config.chain_id,
            nonce: nonce.value.clone(),
            issued_at: now,
            expiration_time: Some(nonce.expires_at),
        };

        tracing::info!(action = "challenge_issued", address = %address, nonce = %redact(&nonce.value), "Challenge issued");

        Ok(ChallengeResponse {
            nonce: nonce.value,
            message: challenge.build(),
            expires_at: nonce.expires_at,
        })
    }

    /// Verify a signed challenge and open a session for its address.
    ///
    /// Once the challenge is bound to this deployment, its nonce is consumed
    /// before the signature is looked at, so a failing proof still burns it.
    pub async fn submit_proof(&self, message: &str, signature: &str) -> Result<Session, AuthError> {
        let challenge = ChallengeMessage::parse(message)?;

        if challenge.domain != self.config.domain {
            return Err(AuthError::DomainMismatch);
        }
        if challenge.uri != self.config.origin {
            return Err(AuthError::UriMismatch);
        }
        if challenge.chain_id != self.config.chain_id {
            return Err(AuthError::ChallengeChainMismatch);
        }

        let now = Utc::now();
        if challenge.expiration_time.is_some_and(|exp| now >= exp) {
            return Err(AuthError::ChallengeExpired);
        }

        self.nonces.try_consume(&challenge.nonce, now).await?;

        if !self
            .verifier
            .verify(message, signature, &challenge.address)
            .await?
        {
            tracing::warn!(action = "login_failed", address = %challenge.address, "Signature does not verify");
            return Err(AuthError::SignatureInvalid);
        }

        let session = self
            .sessions
            .create(challenge.address, self.config.session_ttl(), now)
            .await?;

        tracing::info!(action = "login", address = %session.address, session = %redact(&session.id), "Session created");

        Ok(session)
    }

    /// Address bound to a live session.
    pub async fn who_am_i(&self, session_id: &str) -> Result<Address, AuthError> {
        self.sessions
            .resolve(session_id, Utc::now())
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    /// Revoke the session. Unknown or expired ids succeed too.
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions.revoke(session_id).await?;
        tracing::info!(action = "logout", session = %redact(session_id), "Session revoked");
        Ok(())
    }
}
