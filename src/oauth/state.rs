//! Signed OAuth `state` parameter.
//!
//! Token format: `base64url(JSON payload) "." base64url(HMAC-SHA256(secret, payloadB64))`.
//! The HMAC covers the encoded payload segment exactly as transmitted.
//! `issuedAt` is carried but not checked here: replay protection comes from
//! the nonce registry's TTL and single-use consumption.

use crate::error::{OAuthError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Environment variable holding a dedicated signing secret
pub const STATE_SECRET_ENV: &str = "STATE_SIGNING_SECRET";

/// Domain-separation label for deriving the signing key from the master key
const STATE_KEY_LABEL: &[u8] = b"gsc-bridge/oauth-state/v1";

/// Payload round-tripped through the provider redirect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthState {
    pub workspace_id: String,
    pub nonce: String,
    /// Epoch milliseconds
    pub issued_at: i64,
}

/// Signs and verifies state tokens with HMAC-SHA256.
#[derive(Clone)]
pub struct StateSigner {
    secret: Vec<u8>,
}

impl StateSigner {
    /// Uses `secret` as the HMAC key. Empty secrets are rejected.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(OAuthError::Config("state signing secret is empty".to_string()));
        }
        Ok(Self { secret })
    }

    /// Derives a purpose-bound signing key from the encryption master key.
    ///
    /// `HMAC-SHA256(master, label)` so the AEAD key never doubles as the
    /// signing key.
    pub fn derive_from_master(master_key: &[u8]) -> Result<Self> {
        let mut mac = HmacSha256::new_from_slice(master_key)
            .map_err(|e| OAuthError::Config(format!("invalid master key: {}", e)))?;
        mac.update(STATE_KEY_LABEL);
        Self::new(mac.finalize().into_bytes().to_vec())
    }

    fn mac(&self, payload_b64: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| OAuthError::Config(format!("invalid signing secret: {}", e)))?;
        mac.update(payload_b64.as_bytes());
        Ok(mac)
    }

    /// Serializes and signs `state`.
    pub fn sign_state(&self, state: &OAuthState) -> Result<String> {
        let payload = serde_json::to_vec(state)
            .map_err(|e| OAuthError::Format(format!("failed to serialize state: {}", e)))?;
        let payload_b64 = BASE64URL.encode(payload);
        let signature = self.mac(&payload_b64)?.finalize().into_bytes();

        Ok(format!("{}.{}", payload_b64, BASE64URL.encode(signature)))
    }

    /// Verifies the signature and returns the payload.
    ///
    /// # Returns
    /// * `Err(Format)` - Not two segments, or the signed payload is not valid JSON
    /// * `Err(InvalidSignature)` - Signature does not match (constant-time check)
    pub fn verify_state(&self, token: &str) -> Result<OAuthState> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 2 {
            return Err(OAuthError::Format(format!(
                "state token must have 2 segments, got {}",
                parts.len()
            )));
        }
        let (payload_b64, signature_b64) = (parts[0], parts[1]);

        let signature = BASE64URL
            .decode(signature_b64)
            .map_err(|_| OAuthError::InvalidSignature)?;

        self.mac(payload_b64)?
            .verify_slice(&signature)
            .map_err(|_| OAuthError::InvalidSignature)?;

        let payload = BASE64URL
            .decode(payload_b64)
            .map_err(|e| OAuthError::Format(format!("invalid base64url payload: {}", e)))?;

        serde_json::from_slice(&payload)
            .map_err(|e| OAuthError::Format(format!("invalid state payload: {}", e)))
    }
}

impl std::fmt::Debug for StateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StateSigner { .. }")
    }
}
