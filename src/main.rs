//! Walletgate application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to the chain RPC and confirm it serves the configured chain
//! 3. Connect to Redis, or fall back to the in-process store
//! 4. Build router with API routes, CORS and security headers
//! 5. Start Axum server

use std::sync::Arc;
use std::time::Duration;
use walletgate::{
    auth::{chain::JsonRpcChainClient, AppState, AuthService},
    cleanup,
    config::Config,
    storage::{MemoryStore, NonceStore, RedisStore, SessionStore},
};

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config from environment
    let config = Arc::new(Config::from_env().expect("Failed to load config"));
    tracing::info!(
        domain = %config.domain,
        chain_id = config.chain_id,
        "Starting walletgate on {}",
        config.bind_addr
    );

    // Chain RPC: refuse to start against the wrong network
    let chain = JsonRpcChainClient::new(
        config.rpc_url.clone(),
        Duration::from_secs(config.rpc_timeout_secs),
    )
    .expect("Failed to build RPC client");
    let rpc_chain_id = chain
        .chain_id()
        .await
        .expect("Failed to query chain id from RPC");
    if rpc_chain_id != config.chain_id {
        tracing::error!(
            expected = config.chain_id,
            got = rpc_chain_id,
            "RPC endpoint serves a different chain"
        );
        std::process::exit(1);
    }

    // Storage
    let (nonce_store, session_store) =
        match &config.redis_url {
            Some(url) => {
                let store = RedisStore::open(url, config.redis_timeout())
                    .expect("Invalid Redis URL");
                store.ping().await.expect("Failed to connect to Redis");
                tracing::info!("Using Redis store");
                let store = Arc::new(store);
                (store.clone() as Arc<dyn NonceStore>, store as Arc<dyn SessionStore>)
            }
            None => {
                tracing::warn!("REDIS_URL not set; using in-process store (single instance only)");
                let store = Arc::new(MemoryStore::new());
                tokio::spawn(cleanup::run_cleanup_loop(
                    store.clone(),
                    Duration::from_secs(config.cleanup_interval_secs),
                ));
                (store.clone() as Arc<dyn NonceStore>, store as Arc<dyn SessionStore>)
            }
        };

    // Build shared state
    let auth = AuthService::new(config.clone(), nonce_store, session_store, Arc::new(chain));
    let state = AppState {
        auth: Arc::new(auth),
        config: config.clone(),
    };

    let app = walletgate::app(state).expect("Invalid CORS origin");

    // Bind to configured address
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
