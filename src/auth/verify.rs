//! Wallet signature verification for EOAs (secp256k1 recovery) and contract
//! accounts (ERC-1271).

use crate::auth::address::Address;
use crate::auth::chain::{ChainClient, ChainError};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use std::sync::Arc;

/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`, also the success value.
pub const ERC1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Public key recovery failed")]
    RecoveryFailed,

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// How an address proves signatures, decided by on-chain code presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Eoa,
    Contract,
}

/// EIP-191 personal-message digest of `message`.
pub fn hash_personal_message(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

fn decode_signature_hex(signature: &str) -> Result<Vec<u8>, VerifyError> {
    let digits = signature.strip_prefix("0x").unwrap_or(signature);
    hex::decode(digits).map_err(|e| VerifyError::InvalidSignatureFormat(e.to_string()))
}

/// Recover the signer of `digest` and compare it with `expected`.
///
/// `signature` is hex `r || s || v`. `v` may be `0/1` or `27/28`.
pub fn verify_eoa(
    digest: &[u8; 32],
    signature: &str,
    expected: &Address,
) -> Result<bool, VerifyError> {
    let bytes = decode_signature_hex(signature)?;
    if bytes.len() != 65 {
        return Err(VerifyError::InvalidSignatureFormat(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = match bytes[64] {
        0 | 27 => 0,
        1 | 28 => 1,
        other => {
            return Err(VerifyError::InvalidSignatureFormat(format!(
                "invalid recovery id {}",
                other
            )))
        }
    };
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(VerifyError::RecoveryFailed)?;
    let mut sig = Signature::from_slice(&bytes[..64]).map_err(|_| VerifyError::RecoveryFailed)?;

    // Wallets may emit high-S signatures; recovery only accepts low-S.
    // Negating s mirrors R, so the y parity flips with it.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
        .map_err(|_| VerifyError::RecoveryFailed)?;

    Ok(address_of(&key) == *expected)
}

/// Address owning a secp256k1 verifying key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let mut public = [0u8; 64];
    public.copy_from_slice(&point.as_bytes()[1..]);
    Address::from_public_key(&public)
}

/// ABI calldata for `isValidSignature(bytes32 hash, bytes signature)`.
pub fn encode_is_valid_signature(digest: &[u8; 32], signature: &[u8]) -> Vec<u8> {
    let padded_len = signature.len().div_ceil(32) * 32;
    let mut data = Vec::with_capacity(4 + 32 * 3 + padded_len);
    data.extend_from_slice(&ERC1271_MAGIC_VALUE);
    data.extend_from_slice(digest);
    data.extend_from_slice(&abi_word(64));
    data.extend_from_slice(&abi_word(signature.len() as u64));
    data.extend_from_slice(signature);
    data.resize(4 + 32 * 3 + padded_len, 0);
    data
}

fn abi_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Dispatches a signature check to the path matching the claimed address's
/// current on-chain kind.
#[derive(Clone)]
pub struct SignatureVerifier {
    chain: Arc<dyn ChainClient>,
}

impl SignatureVerifier {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        SignatureVerifier { chain }
    }

    /// Queried on every call; an address can gain code at any block.
    pub async fn resolve_account_kind(&self, address: &Address) -> Result<AccountKind, VerifyError> {
        let code = self.chain.code_at(address).await?;
        Ok(if code.is_empty() {
            AccountKind::Eoa
        } else {
            AccountKind::Contract
        })
    }

    /// ERC-1271 check.
    ///
    /// Reverts and non-magic return data are `Ok(false)`. Transport failures and
    /// responses the node could not encode are `Err`.
    pub async fn verify_contract(
        &self,
        digest: &[u8; 32],
        signature: &str,
        contract: &Address,
    ) -> Result<bool, VerifyError> {
        let sig = decode_signature_hex(signature)?;
        let data = encode_is_valid_signature(digest, &sig);

        match self.chain.call(contract, &data).await {
            Ok(ret) => Ok(ret.len() >= 4 && ret[..4] == ERC1271_MAGIC_VALUE),
            Err(ChainError::Rpc { code, message }) => {
                tracing::debug!(contract = %contract, code, message = %message, "isValidSignature call rejected");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify `signature` over `message` for `claimed`.
    ///
    /// `claimed` must come from the parsed message; the path is chosen from its
    /// on-chain state, never from caller input.
    pub async fn verify(
        &self,
        message: &str,
        signature: &str,
        claimed: &Address,
    ) -> Result<bool, VerifyError> {
        let digest = hash_personal_message(message.as_bytes());
        match self.resolve_account_kind(claimed).await? {
            AccountKind::Eoa => verify_eoa(&digest, signature, claimed),
            AccountKind::Contract => self.verify_contract(&digest, signature, claimed).await,
        }
    }
}
