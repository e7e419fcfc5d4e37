use crate::auth::message::is_valid_statement;
use axum::http::HeaderValue;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    // Sign-in challenge
    pub domain: String,
    pub origin: String,
    pub chain_id: u64,
    pub statement: Option<String>,

    // TTLs (in seconds)
    pub nonce_ttl_secs: u64,
    pub session_ttl_secs: u64,

    // Session cookie
    pub cookie_name: String,

    // Chain RPC
    pub rpc_url: String,
    pub rpc_timeout_secs: u64,

    // Redis (None = in-process store)
    pub redis_url: Option<String>,
    pub redis_timeout_secs: u64,

    // Server
    pub bind_addr: SocketAddr,
    pub cors_origin: String,
    pub cleanup_interval_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("domain", &self.domain)
            .field("origin", &self.origin)
            .field("chain_id", &self.chain_id)
            .field("statement", &self.statement)
            .field("nonce_ttl_secs", &self.nonce_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .field("rpc_url", &"[REDACTED]")
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("redis_timeout_secs", &self.redis_timeout_secs)
            .field("bind_addr", &self.bind_addr)
            .field("cors_origin", &self.cors_origin)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let domain = required_var("SIWE_DOMAIN")?;
        if domain.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(
                "SIWE_DOMAIN".to_string(),
                "must not contain whitespace".to_string(),
            ));
        }

        let origin = required_var("SIWE_ORIGIN")?;
        if !(origin.starts_with("https://") || origin.starts_with("http://"))
            || origin.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::InvalidValue(
                "SIWE_ORIGIN".to_string(),
                "must be an http(s) URI without whitespace".to_string(),
            ));
        }

        let chain_id_str = required_var("SIWE_CHAIN_ID")?;
        let chain_id = chain_id_str.parse::<u64>().map_err(|e| {
            ConfigError::ParseError("SIWE_CHAIN_ID".to_string(), format!("{}: {}", e, chain_id_str))
        })?;

        // Optional single-line statement shown to the user by the wallet
        let statement = env::var("SIWE_STATEMENT").ok();
        if let Some(s) = &statement {
            if !is_valid_statement(s) {
                return Err(ConfigError::InvalidValue(
                    "SIWE_STATEMENT".to_string(),
                    "must be a single non-blank line that is not a `Label: value` field"
                        .to_string(),
                ));
            }
        }

        // TTLs
        let nonce_ttl_secs = parse_nonzero_or_default("NONCE_TTL_SECS", 300)?;
        let session_ttl_secs = parse_nonzero_or_default("SESSION_TTL_SECS", 900)?;

        let cookie_name = env::var("COOKIE_NAME").unwrap_or_else(|_| "sid".to_string());
        if cookie_name.is_empty()
            || !cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidValue(
                "COOKIE_NAME".to_string(),
                "may only contain ASCII alphanumeric characters, hyphens, and underscores"
                    .to_string(),
            ));
        }

        // Chain RPC (required)
        let rpc_url = required_var("RPC_URL")?;
        let rpc_timeout_secs = parse_nonzero_or_default("RPC_TIMEOUT_SECS", 10)?;

        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let redis_timeout_secs = parse_nonzero_or_default("REDIS_TIMEOUT_SECS", 5)?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let cors_origin =
            env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());
        if HeaderValue::from_str(&cors_origin).is_err() {
            return Err(ConfigError::InvalidValue(
                "CORS_ORIGIN".to_string(),
                "not a valid header value".to_string(),
            ));
        }

        let cleanup_interval_secs = parse_nonzero_or_default("CLEANUP_INTERVAL_SECS", 60)?;

        Ok(Config {
            domain,
            origin,
            chain_id,
            statement,
            nonce_ttl_secs,
            session_ttl_secs,
            cookie_name,
            rpc_url,
            rpc_timeout_secs,
            redis_url,
            redis_timeout_secs,
            bind_addr,
            cors_origin,
            cleanup_interval_secs,
        })
    }

    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_ttl_secs)
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn required_var(key: &str) -> Result<String, ConfigError> {
    let value = env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "cannot be empty".to_string(),
        ));
    }
    Ok(value)
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

fn parse_nonzero_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = parse_env_or_default(key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}
