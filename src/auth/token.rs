//! Random nonce and session id generation.

use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

/// Bytes of entropy in a challenge nonce.
pub const NONCE_BYTES: usize = 16;

/// Bytes of entropy in a session id.
pub const SESSION_ID_BYTES: usize = 32;

/// Generate a cryptographically random challenge nonce.
///
/// Returns 32 lowercase hex characters from 16 random bytes.
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; NONCE_BYTES];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// Generate a cryptographically random session id.
///
/// Returns a URL-safe, unpadded base64 string (43 characters) from 32 random
/// bytes, valid as a cookie value without quoting.
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Shortened form of a secret token for log lines.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}…", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_nonce() {
        let nonce = generate_nonce();

        assert_eq!(nonce.len(), 32);
        assert!(nonce
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(hex::decode(&nonce).unwrap().len(), NONCE_BYTES);
    }

    #[test]
    fn test_generate_session_id() {
        let id = generate_session_id();

        // Unpadded base64 of 32 bytes is 43 characters
        assert_eq!(id.len(), 43);

        let decoded = general_purpose::URL_SAFE_NO_PAD.decode(&id).unwrap();
        assert_eq!(decoded.len(), SESSION_ID_BYTES);

        // Cookie-safe alphabet
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_nonce(), generate_nonce());
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("abcdef0123456789"), "abcdef…");
        assert_eq!(redact("abc"), "abc…");
    }
}
