//! Redis-backed nonce and session storage.
//!
//! Redis key patterns:
//! - `nonce:{value}`: hash `{expires_at_ms, consumed}`, key TTL = nonce TTL + retention
//! - `session:{id}`: session data (JSON), key TTL = session TTL
//!
//! Session JSON read back from Redis is wrapped in `Zeroizing` so the
//! application's copy of the bound address and id is cleared after parsing.

use super::{
    ttl_secs_until, ConsumeError, NonceStore, SessionStore, StoreError, NONCE_RETENTION,
};
use crate::models::{Nonce, Session};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, AsyncConnectionConfig};
use std::time::Duration;
use zeroize::Zeroizing;

/// Check-and-mark in a single server-side step.
///
/// Returns 0 = not found, 1 = consumed now, 2 = already used, 3 = expired.
const CONSUME_NONCE_SCRIPT: &str = r"
    if redis.call('EXISTS', KEYS[1]) == 0 then
        return 0
    end
    if redis.call('HGET', KEYS[1], 'consumed') == '1' then
        return 2
    end
    if tonumber(redis.call('HGET', KEYS[1], 'expires_at_ms')) <= tonumber(ARGV[1]) then
        return 3
    end
    redis.call('HSET', KEYS[1], 'consumed', '1')
    return 1
";

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    timeout: Duration,
}

fn nonce_key(value: &str) -> String {
    format!("nonce:{}", value)
}

fn session_key(id: &str) -> String {
    format!("session:{}", id)
}

impl RedisStore {
    /// `timeout` bounds both connecting and each command's response.
    pub fn new(client: redis::Client, timeout: Duration) -> Self {
        RedisStore { client, timeout }
    }

    pub fn open(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        Ok(RedisStore::new(redis::Client::open(url)?, timeout))
    }

    fn connection_config(&self) -> AsyncConnectionConfig {
        AsyncConnectionConfig::new()
            .set_connection_timeout(self.timeout)
            .set_response_timeout(self.timeout)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        Ok(self
            .client
            .get_multiplexed_async_connection_with_config(&self.connection_config())
            .await?)
    }

    /// Round-trip a PING, used at startup to fail fast on a bad `REDIS_URL`.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        redis::cmd("PING").query_async::<()>(&mut con).await?;
        Ok(())
    }
}

#[async_trait]
impl NonceStore for RedisStore {
    async fn insert_nonce(&self, nonce: &Nonce) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let key = nonce_key(&nonce.value);
        let ttl = ttl_secs_until(nonce.expires_at, Utc::now()) + NONCE_RETENTION.as_secs();

        redis::pipe()
            .atomic()
            .hset_multiple(
                &key,
                &[
                    ("expires_at_ms", nonce.expires_at.timestamp_millis()),
                    ("consumed", i64::from(nonce.consumed)),
                ],
            )
            .ignore()
            .expire(&key, ttl as i64)
            .ignore()
            .query_async::<()>(&mut con)
            .await?;
        Ok(())
    }

    async fn try_consume_nonce(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ConsumeError> {
        let mut con = self.connection().await?;
        let script = redis::Script::new(CONSUME_NONCE_SCRIPT);
        let outcome: i64 = script
            .key(nonce_key(value))
            .arg(now.timestamp_millis())
            .invoke_async(&mut con)
            .await
            .map_err(StoreError::from)?;

        match outcome {
            1 => Ok(()),
            0 => Err(ConsumeError::NotFound),
            2 => Err(ConsumeError::AlreadyUsed),
            3 => Err(ConsumeError::Expired),
            other => Err(StoreError::Corrupt(format!("consume script returned {}", other)).into()),
        }
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let json = Zeroizing::new(serde_json::to_string(session)?);
        let ttl = ttl_secs_until(session.expires_at, Utc::now());

        con.set_ex::<_, _, ()>(session_key(&session.id), json.as_str(), ttl)
            .await?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let mut con = self.connection().await?;
        let json: Option<String> = con.get(session_key(id)).await?;

        match json {
            Some(data) => {
                let data = Zeroizing::new(data);
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let mut con = self.connection().await?;
        let deleted: i64 = con.del(session_key(id)).await?;
        Ok(deleted > 0)
    }
}
