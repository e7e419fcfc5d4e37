pub mod auth;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod storage;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use crate::auth::middleware::AppState;
use axum::Router;

/// Largest request body accepted by any endpoint.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// API routes with body limit, CORS and security headers applied.
pub fn app(state: AppState) -> Result<Router, axum::http::header::InvalidHeaderValue> {
    let cors = middleware::cors_layer(&state.config.cors_origin)?;

    Ok(routes::api_router()
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .with_state(state))
}
