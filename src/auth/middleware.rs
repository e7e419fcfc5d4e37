//! Axum extractors for the session cookie and the authenticated address.

use crate::auth::address::Address;
use crate::auth::service::AuthService;
use crate::config::Config;
use crate::error::{AppError, AuthError};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
};
use std::convert::Infallible;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub config: Arc<Config>,
}

/// Value of the named cookie, if the request carries one.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value carrying a new session id.
pub fn session_cookie(config: &Config, session_id: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; Secure; SameSite=Strict",
        config.cookie_name, session_id, config.session_ttl_secs
    ))
    .map_err(|e| AppError::Internal(format!("Invalid session cookie: {}", e)))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn expired_session_cookie(config: &Config) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(&format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Strict",
        config.cookie_name
    ))
    .map_err(|e| AppError::Internal(format!("Invalid session cookie: {}", e)))
}

/// Raw session id from the configured cookie. Never rejects.
pub struct SessionCookie(pub Option<String>);

impl FromRequestParts<AppState> for SessionCookie {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(SessionCookie(cookie_value(
            &parts.headers,
            &state.config.cookie_name,
        )))
    }
}

/// Address bound to the caller's live session.
///
/// Handlers taking this parameter only run for authenticated requests;
/// anything else is rejected with 401 before the handler body.
pub struct AuthenticatedAddress(pub Address);

impl FromRequestParts<AppState> for AuthenticatedAddress {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionCookie(session_id) = SessionCookie::from_request_parts(parts, state)
            .await
            .unwrap_or(SessionCookie(None));
        let session_id = session_id.ok_or(AuthError::Unauthenticated)?;

        let address = state.auth.who_am_i(&session_id).await?;
        Ok(AuthenticatedAddress(address))
    }
}
