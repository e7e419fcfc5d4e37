//! Test doubles and signing helpers shared by unit and integration tests.

use crate::auth::address::Address;
use crate::auth::chain::{ChainClient, ChainError};
use crate::auth::verify::hash_personal_message;
use crate::config::Config;
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Minimal runtime bytecode (`PUSH1 0x80 PUSH1 0x40 MSTORE`), enough to mark an
/// address as a contract.
const SOME_CODE: &[u8] = &[0x60, 0x80, 0x60, 0x40, 0x52];

/// Scripted [`ChainClient`] that records every call it receives.
pub struct MockChainClient {
    code: Result<Vec<u8>, ChainError>,
    call_result: Result<Vec<u8>, ChainError>,
    code_at_count: AtomicUsize,
    calls: Mutex<Vec<(Address, Vec<u8>)>>,
}

impl MockChainClient {
    /// Every address has no code; `call` fails with a revert.
    pub fn eoa() -> Self {
        MockChainClient {
            code: Ok(Vec::new()),
            call_result: Err(ChainError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            }),
            code_at_count: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every address has code; `call` returns empty data until scripted.
    pub fn contract() -> Self {
        MockChainClient {
            code: Ok(SOME_CODE.to_vec()),
            call_result: Ok(Vec::new()),
            ..Self::eoa()
        }
    }

    pub fn with_code_result(mut self, code: Result<Vec<u8>, ChainError>) -> Self {
        self.code = code;
        self
    }

    pub fn with_call_result(mut self, result: Result<Vec<u8>, ChainError>) -> Self {
        self.call_result = result;
        self
    }

    pub fn code_at_count(&self) -> usize {
        self.code_at_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(Address, Vec<u8>)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn code_at(&self, _address: &Address) -> Result<Vec<u8>, ChainError> {
        self.code_at_count.fetch_add(1, Ordering::SeqCst);
        self.code.clone()
    }

    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((*to, data.to_vec()));
        self.call_result.clone()
    }
}

/// Configuration for `app.example` on chain 1 with in-process storage.
pub fn test_config() -> Config {
    Config {
        domain: "app.example".to_string(),
        origin: "https://app.example".to_string(),
        chain_id: 1,
        statement: Some("Sign in to app.example".to_string()),
        nonce_ttl_secs: 300,
        session_ttl_secs: 900,
        cookie_name: "sid".to_string(),
        rpc_url: "http://127.0.0.1:8545".to_string(),
        rpc_timeout_secs: 10,
        redis_url: None,
        redis_timeout_secs: 5,
        bind_addr: ([127, 0, 0, 1], 0).into(),
        cors_origin: "https://app.example".to_string(),
        cleanup_interval_secs: 60,
    }
}

/// Deterministic secp256k1 key with every secret byte set to `seed` (non-zero).
pub fn test_signing_key(seed: u8) -> SigningKey {
    assert!(seed != 0, "zero is not a valid secp256k1 secret");
    SigningKey::from_slice(&[seed; 32]).expect("small repeated-byte scalars are valid keys")
}

/// Wallet-style `personal_sign`: hex `0x{r}{s}{v}` with `v` in `27/28`.
pub fn sign_personal_message(key: &SigningKey, message: &str) -> String {
    let digest = hash_personal_message(message.as_bytes());
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .expect("signing a 32-byte prehash");

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    format!("0x{}", hex::encode(bytes))
}
