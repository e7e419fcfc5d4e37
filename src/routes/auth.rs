//! Auth API endpoints.

use crate::auth::middleware::{
    expired_session_cookie, session_cookie, AppState, AuthenticatedAddress, SessionCookie,
};
use crate::error::AppError;
use crate::models::{ChallengeRequest, VerifyRequest, WhoAmIResponse};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

/// POST /auth/nonce: Issue a sign-in challenge
pub async fn request_challenge(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let challenge = state
        .auth
        .request_challenge(&req.address, req.chain_id, &req.origin)
        .await?;

    Ok(Json(challenge))
}

/// POST /auth/verify: Verify a signed challenge and set the session cookie
pub async fn submit_proof(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.submit_proof(&req.message, &req.signature).await?;
    let cookie = session_cookie(&state.config, &session.id)?;

    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

/// GET /me: Address bound to the current session
pub async fn who_am_i(AuthenticatedAddress(address): AuthenticatedAddress) -> impl IntoResponse {
    Json(WhoAmIResponse {
        address: address.to_string(),
    })
}

/// POST /auth/logout: Revoke the current session, if any
pub async fn logout(
    State(state): State<AppState>,
    SessionCookie(session_id): SessionCookie,
) -> Result<impl IntoResponse, AppError> {
    if let Some(session_id) = session_id {
        // The browser drops its cookie either way; a failed delete is only logged.
        if let Err(e) = state.auth.logout(&session_id).await {
            tracing::error!(action = "logout", error = %e, "Session revoke failed");
        }
    }
    let cookie = expired_session_cookie(&state.config)?;

    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

#[cfg(test)]
mod tests {
    use crate::auth::{AppState, AuthService};
    use crate::models::Session;
    use crate::storage::{MemoryStore, SessionStore, StoreError};
    use crate::testing::{test_config, MockChainClient};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Session store whose backend is down.
    struct UnavailableSessionStore;

    #[async_trait]
    impl SessionStore for UnavailableSessionStore {
        async fn insert_session(&self, _session: &Session) -> Result<(), StoreError> {
            Err(StoreError::Corrupt("unavailable".to_string()))
        }

        async fn get_session(&self, _id: &str) -> Result<Option<Session>, StoreError> {
            Err(StoreError::Corrupt("unavailable".to_string()))
        }

        async fn delete_session(&self, _id: &str) -> Result<bool, StoreError> {
            Err(StoreError::Corrupt("unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_logout_expires_cookie_when_store_fails() {
        let config = Arc::new(test_config());
        let auth = AuthService::new(
            config.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(UnavailableSessionStore),
            Arc::new(MockChainClient::eoa()),
        );
        let app = crate::app(AppState {
            auth: Arc::new(auth),
            config,
        })
        .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/logout")
                    .header("cookie", "sid=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookie = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("sid=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
