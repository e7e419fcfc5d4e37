//! Error types and Axum response conversions.

use crate::auth::address::InvalidAddress;
use crate::auth::chain::ChainError;
use crate::auth::message::ChallengeError;
use crate::auth::verify::VerifyError;
use crate::storage::{ConsumeError, StoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Outcome of a failed authentication-engine operation.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Validation (client-caused)
    #[error("Wrong chain id: expected {expected}, got {got}")]
    ChainMismatch { expected: u64, got: u64 },

    #[error("Origin not allowed")]
    OriginMismatch,

    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    #[error(transparent)]
    MalformedChallenge(#[from] ChallengeError),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    // Authentication
    #[error("Challenge domain mismatch")]
    DomainMismatch,

    #[error("Challenge URI mismatch")]
    UriMismatch,

    #[error("Challenge chain id mismatch")]
    ChallengeChainMismatch,

    #[error("Challenge expired")]
    ChallengeExpired,

    #[error("Nonce not found")]
    NonceNotFound,

    #[error("Nonce already used")]
    NonceAlreadyUsed,

    #[error("Nonce expired")]
    NonceExpired,

    #[error("Signature invalid")]
    SignatureInvalid,

    #[error("Not authenticated")]
    Unauthenticated,

    // Infrastructure
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl From<ConsumeError> for AuthError {
    fn from(err: ConsumeError) -> Self {
        match err {
            ConsumeError::NotFound => AuthError::NonceNotFound,
            ConsumeError::AlreadyUsed => AuthError::NonceAlreadyUsed,
            ConsumeError::Expired => AuthError::NonceExpired,
            ConsumeError::Store(e) => AuthError::Store(e),
        }
    }
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidSignatureFormat(msg) => AuthError::InvalidSignatureFormat(msg),
            VerifyError::RecoveryFailed => AuthError::SignatureInvalid,
            VerifyError::Chain(e) => AuthError::Chain(e),
        }
    }
}

/// Application error types.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ChainMismatch { .. }
            | AuthError::OriginMismatch
            | AuthError::InvalidAddress(_)
            | AuthError::MalformedChallenge(_)
            | AuthError::InvalidSignatureFormat(_) => AppError::BadRequest(err.to_string()),

            AuthError::DomainMismatch
            | AuthError::UriMismatch
            | AuthError::ChallengeChainMismatch
            | AuthError::ChallengeExpired
            | AuthError::NonceNotFound
            | AuthError::NonceAlreadyUsed
            | AuthError::NonceExpired
            | AuthError::SignatureInvalid
            | AuthError::Unauthenticated => AppError::Unauthorized(err.to_string()),

            AuthError::Store(_) | AuthError::Chain(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Internal(msg) => {
                // Log detailed error server-side, return generic message to client
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
