//! Integration tests for the walletgate API.
//!
//! Each test serves the real router on an ephemeral port, backed by the
//! in-process store and a scripted chain client.

use k256::ecdsa::SigningKey;
use reqwest::StatusCode;
use std::sync::Arc;
use walletgate::{
    auth::{address::Address, verify::address_of, verify::ERC1271_MAGIC_VALUE, AppState, AuthService},
    models::ChallengeResponse,
    storage::MemoryStore,
    testing::{sign_personal_message, test_config, test_signing_key, MockChainClient},
};

struct TestServer {
    base_url: String,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

/// Spin up a test server and return its base URL and backing store.
async fn spawn_test_server(chain: MockChainClient) -> TestServer {
    let config = Arc::new(test_config());
    let store = Arc::new(MemoryStore::new());

    let auth = AuthService::new(config.clone(), store.clone(), store.clone(), Arc::new(chain));
    let state = AppState {
        auth: Arc::new(auth),
        config,
    };
    let app = walletgate::app(state).expect("valid CORS origin");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        store,
        client: reqwest::Client::new(),
    }
}

impl TestServer {
    async fn request_challenge(&self, address: &str, chain_id: u64) -> reqwest::Response {
        self.client
            .post(format!("{}/auth/nonce", self.base_url))
            .json(&serde_json::json!({
                "address": address,
                "chainId": chain_id,
                "origin": "https://app.example",
            }))
            .send()
            .await
            .unwrap()
    }

    async fn challenge_for(&self, address: &Address) -> ChallengeResponse {
        let res = self.request_challenge(&address.to_string(), 1).await;
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    async fn submit(&self, message: &str, signature: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/auth/verify", self.base_url))
            .json(&serde_json::json!({
                "message": message,
                "signature": signature,
            }))
            .send()
            .await
            .unwrap()
    }

    async fn me(&self, cookie: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(format!("{}/me", self.base_url));
        if let Some(cookie) = cookie {
            req = req.header("cookie", cookie);
        }
        req.send().await.unwrap()
    }

    async fn logout(&self, cookie: Option<&str>) -> reqwest::Response {
        let mut req = self.client.post(format!("{}/auth/logout", self.base_url));
        if let Some(cookie) = cookie {
            req = req.header("cookie", cookie);
        }
        req.send().await.unwrap()
    }

    /// Full EOA sign-in; returns the `name=value` cookie pair.
    async fn sign_in(&self, key: &SigningKey) -> String {
        let challenge = self.challenge_for(&address_of(key.verifying_key())).await;
        let signature = sign_personal_message(key, &challenge.message);
        let res = self.submit(&challenge.message, &signature).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        cookie_pair(&res)
    }
}

fn set_cookie(res: &reqwest::Response) -> String {
    res.headers()
        .get("set-cookie")
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

fn cookie_pair(res: &reqwest::Response) -> String {
    set_cookie(res).split(';').next().unwrap().to_string()
}

async fn error_message(res: reqwest::Response) -> String {
    let body: serde_json::Value = res.json().await.unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_sign_in_flow() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let key = test_signing_key(11);
    let address = address_of(key.verifying_key());

    // Request challenge
    let challenge = server.challenge_for(&address).await;
    assert!(challenge
        .message
        .starts_with("app.example wants you to sign in with your Ethereum account:\n"));
    assert!(challenge.message.contains(&address.to_checksum()));
    assert!(challenge.message.contains(&format!("Nonce: {}\n", challenge.nonce)));

    // Submit proof
    let signature = sign_personal_message(&key, &challenge.message);
    let res = server.submit(&challenge.message, &signature).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let header = set_cookie(&res);
    assert!(header.starts_with("sid="));
    assert!(header.contains("Path=/"));
    assert!(header.contains("Max-Age=900"));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("Secure"));
    assert!(header.contains("SameSite=Strict"));
    let cookie = cookie_pair(&res);

    // Who am I: lowercase address
    let res = server.me(Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["address"], address.to_string());
    assert_eq!(
        body["address"].as_str().unwrap(),
        body["address"].as_str().unwrap().to_lowercase()
    );

    // Logout expires the cookie
    let res = server.logout(Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&res).contains("Max-Age=0"));

    // The old cookie no longer authenticates
    let res = server.me(Some(&cookie)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(res).await, "Not authenticated");
}

#[tokio::test]
async fn test_replayed_proof_rejected() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let key = test_signing_key(12);
    let challenge = server.challenge_for(&address_of(key.verifying_key())).await;
    let signature = sign_personal_message(&key, &challenge.message);

    let res = server.submit(&challenge.message, &signature).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.submit(&challenge.message, &signature).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get("set-cookie").is_none());
    assert_eq!(error_message(res).await, "Nonce already used");
}

#[tokio::test]
async fn test_concurrent_submissions_single_winner() {
    let server = Arc::new(spawn_test_server(MockChainClient::eoa()).await);
    let key = test_signing_key(13);
    let challenge = server.challenge_for(&address_of(key.verifying_key())).await;
    let signature = sign_personal_message(&key, &challenge.message);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let server = server.clone();
        let message = challenge.message.clone();
        let signature = signature.clone();
        handles.push(tokio::spawn(async move {
            server.submit(&message, &signature).await.status()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::NO_CONTENT => successes += 1,
            status => assert_eq!(status, StatusCode::UNAUTHORIZED),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(server.store.session_count(), 1);
}

#[tokio::test]
async fn test_chain_mismatch_rejected_before_nonce() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let address = address_of(test_signing_key(14).verifying_key());

    let res = server.request_challenge(&address.to_string(), 10).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(res).await,
        "Wrong chain id: expected 1, got 10"
    );
    assert_eq!(server.store.nonce_count(), 0);
}

#[tokio::test]
async fn test_origin_mismatch_rejected() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let res = server
        .client
        .post(format!("{}/auth/nonce", server.base_url))
        .json(&serde_json::json!({
            "address": "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23",
            "chainId": 1,
            "origin": "https://evil.example",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.store.nonce_count(), 0);
}

#[tokio::test]
async fn test_tampered_message_rejected() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let key = test_signing_key(15);
    let challenge = server.challenge_for(&address_of(key.verifying_key())).await;
    let signature = sign_personal_message(&key, &challenge.message);

    let tampered = challenge.message.replace("Sign in to", "Sign into");
    let res = server.submit(&tampered, &signature).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(res).await, "Signature invalid");
}

#[tokio::test]
async fn test_malformed_challenge_rejected() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let res = server.submit("not a challenge", "0x00").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(res).await.starts_with("Malformed challenge"));
}

#[tokio::test]
async fn test_contract_wallet_sign_in() {
    let mut magic = ERC1271_MAGIC_VALUE.to_vec();
    magic.resize(32, 0);
    let server = spawn_test_server(MockChainClient::contract().with_call_result(Ok(magic))).await;
    let wallet = Address::from_bytes([0x5a; 20]);

    let challenge = server.challenge_for(&wallet).await;
    let res = server.submit(&challenge.message, "0x1234").await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.me(Some(&cookie_pair(&res))).await;
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["address"], wallet.to_string());
}

#[tokio::test]
async fn test_chain_outage_is_opaque_server_error() {
    let server = spawn_test_server(MockChainClient::eoa().with_code_result(Err(
        walletgate::auth::chain::ChainError::Transport("dial tcp 10.1.2.3:8545".to_string()),
    )))
    .await;
    let key = test_signing_key(16);
    let challenge = server.challenge_for(&address_of(key.verifying_key())).await;
    let signature = sign_personal_message(&key, &challenge.message);

    let res = server.submit(&challenge.message, &signature).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_message(res).await, "Internal server error");
}

#[tokio::test]
async fn test_me_requires_session() {
    let server = spawn_test_server(MockChainClient::eoa()).await;

    assert_eq!(server.me(None).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        server.me(Some("sid=doesnotexist")).await.status(),
        StatusCode::UNAUTHORIZED
    );

    // A cookie under another name is ignored
    let cookie = server.sign_in(&test_signing_key(17)).await;
    let renamed = cookie.replacen("sid=", "other=", 1);
    assert_eq!(
        server.me(Some(&renamed)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(server.me(Some(&cookie)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_without_session_succeeds() {
    let server = spawn_test_server(MockChainClient::eoa()).await;

    let res = server.logout(None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&res).contains("Max-Age=0"));

    let res = server.logout(Some("sid=unknown")).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let key = test_signing_key(18);

    let first = server.sign_in(&key).await;
    let second = server.sign_in(&key).await;
    assert_ne!(first, second);

    server.logout(Some(&first)).await;
    assert_eq!(
        server.me(Some(&first)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(server.me(Some(&second)).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let res = server.submit(&"a".repeat(32 * 1024), "0x00").await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_invalid_json_rejected() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let res = server
        .client
        .post(format!("{}/auth/verify", server.base_url))
        .header("content-type", "application/json")
        .body("{\"message\":")
        .send()
        .await
        .unwrap();
    assert!(res.status().is_client_error());
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let server = spawn_test_server(MockChainClient::eoa()).await;

    for res in [
        server.me(None).await,
        server.request_challenge("0x2c7536e3605d9c16a7a3d7b1898e529396a65c23", 1).await,
    ] {
        let headers = res.headers();
        assert_eq!(headers.get("cache-control").unwrap(), "no-store");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert!(headers.get("content-security-policy").is_some());
    }
}

#[tokio::test]
async fn test_cors_preflight() {
    let server = spawn_test_server(MockChainClient::eoa()).await;
    let res = server
        .client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/auth/verify", server.base_url),
        )
        .header("origin", "https://app.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();

    assert!(res.status().is_success());
    assert_eq!(
        res.headers().get("access-control-allow-origin").unwrap(),
        "https://app.example"
    );
    assert_eq!(
        res.headers().get("access-control-allow-credentials").unwrap(),
        "true"
    );
}
