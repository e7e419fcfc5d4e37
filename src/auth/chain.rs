//! Read-only access to the configured EVM chain over JSON-RPC.

use crate::auth::address::Address;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// The node could not be reached or answered with a non-success HTTP status.
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object (e.g. a reverted call).
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    MalformedResponse(String),
}

/// The chain queries the verifier depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Deployed bytecode at `address` on the latest block. Empty for EOAs.
    async fn code_at(&self, address: &Address) -> Result<Vec<u8>, ChainError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError>;
}

/// Ethereum JSON-RPC client over HTTP.
pub struct JsonRpcChainClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl JsonRpcChainClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(JsonRpcChainClient {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// `eth_chainId` of the connected node.
    pub async fn chain_id(&self) -> Result<u64, ChainError> {
        let result = self.request("eth_chainId", json!([])).await?;
        let hex_str = result_as_str(&result)?;
        let digits = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        u64::from_str_radix(digits, 16)
            .map_err(|e| ChainError::MalformedResponse(format!("eth_chainId: {}", e)))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("{}: {}", method, e)))?
            .error_for_status()
            .map_err(|e| ChainError::Transport(format!("{}: {}", method, e)))?;

        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::MalformedResponse(format!("{}: {}", method, e)))?;

        if let Some(err) = response.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        response
            .result
            .ok_or_else(|| ChainError::MalformedResponse(format!("{}: missing result", method)))
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn code_at(&self, address: &Address) -> Result<Vec<u8>, ChainError> {
        let result = self
            .request("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        decode_hex_result(&result)
    }

    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let tx = json!({
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        });
        let result = self.request("eth_call", json!([tx, "latest"])).await?;
        decode_hex_result(&result)
    }
}

fn result_as_str(value: &Value) -> Result<&str, ChainError> {
    value
        .as_str()
        .ok_or_else(|| ChainError::MalformedResponse("expected a hex string".to_string()))
}

fn decode_hex_result(value: &Value) -> Result<Vec<u8>, ChainError> {
    let s = result_as_str(value)?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ChainError::MalformedResponse(e.to_string()))
}
