//! API route handlers.

pub mod auth;

use crate::auth::middleware::AppState;
use axum::{routing::get, routing::post, Router};

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/auth/nonce", post(auth::request_challenge))
        .route("/auth/verify", post(auth::submit_proof))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::who_am_i))
}
