//! AES-256-GCM envelope for credential tokens.
//!
//! Each call to [`CryptoEnvelope::encrypt`] uses a fresh random 96-bit IV.
//! Blobs are serialized as `base64url(iv).base64url(tag).base64url(ciphertext)`
//! (unpadded URL-safe alphabet). The master key must be 32 bytes (256 bits)
//! and is provided base64-encoded from the environment.

use crate::error::{OAuthError, Result};
use aes_gcm::{
    aead::{AeadCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce, Tag,
};
use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64URL},
    Engine,
};

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the IV in bytes (96 bits, standard for GCM)
const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes
const TAG_SIZE: usize = 16;

/// Environment variable holding the base64-encoded master key
pub const ENCRYPTION_KEY_ENV: &str = "ENCRYPTION_KEY";

/// Validates that the master key is exactly 32 bytes when base64 decoded.
///
/// # Returns
/// * `Ok([u8; 32])` - Decoded key bytes
/// * `Err(OAuthError::Config)` - If key is invalid base64 or the wrong length
pub fn validate_key(key_base64: &str) -> Result<[u8; KEY_SIZE]> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .map_err(|e| OAuthError::Config(format!("failed to decode base64 encryption key: {}", e)))?;

    key_bytes.as_slice().try_into().map_err(|_| {
        OAuthError::Config(format!(
            "encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ))
    })
}

/// Authenticated symmetric encryption of opaque strings.
///
/// # Security
/// - Confidentiality and tamper detection (AEAD)
/// - IV never reused: drawn from the OS RNG per call
/// - Key held in memory only, never rotated at runtime
#[derive(Clone)]
pub struct CryptoEnvelope {
    cipher: Aes256Gcm,
}

impl CryptoEnvelope {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Builds an envelope from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_base64: &str) -> Result<Self> {
        let key = validate_key(key_base64)?;
        Ok(Self::new(&key))
    }

    /// Builds an envelope from the `ENCRYPTION_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(ENCRYPTION_KEY_ENV).map_err(|_| {
            OAuthError::Config(format!(
                "missing {} env var (base64 32 bytes)",
                ENCRYPTION_KEY_ENV
            ))
        })?;
        Self::from_base64_key(&key)
    }

    /// Encrypts `plaintext` into an `iv.tag.ciphertext` blob.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        // Generate random IV (never reuse!)
        let iv = Aes256Gcm::generate_nonce(&mut OsRng);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(&iv, b"", &mut buffer)
            .map_err(|_| OAuthError::Authentication)?;

        Ok(format!(
            "{}.{}.{}",
            BASE64URL.encode(iv),
            BASE64URL.encode(tag),
            BASE64URL.encode(&buffer)
        ))
    }

    /// Decrypts a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// # Returns
    /// * `Err(OAuthError::Format)` - Not three segments, bad base64, or bad IV/tag length
    /// * `Err(OAuthError::Authentication)` - Wrong key, wrong IV, or tampered data
    pub fn decrypt(&self, blob: &str) -> Result<String> {
        let parts: Vec<&str> = blob.split('.').collect();
        if parts.len() != 3 {
            return Err(OAuthError::Format(format!(
                "encrypted blob must have 3 segments, got {}",
                parts.len()
            )));
        }

        let iv = decode_segment(parts[0], "iv")?;
        let tag = decode_segment(parts[1], "tag")?;
        let mut buffer = decode_segment(parts[2], "ciphertext")?;

        if iv.len() != IV_SIZE {
            return Err(OAuthError::Format(format!(
                "invalid iv size: expected {}, got {}",
                IV_SIZE,
                iv.len()
            )));
        }
        if tag.len() != TAG_SIZE {
            return Err(OAuthError::Format(format!(
                "invalid tag size: expected {}, got {}",
                TAG_SIZE,
                tag.len()
            )));
        }

        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&iv),
                b"",
                &mut buffer,
                Tag::from_slice(&tag),
            )
            .map_err(|_| OAuthError::Authentication)?;

        String::from_utf8(buffer)
            .map_err(|_| OAuthError::Format("decrypted data is not valid UTF-8".to_string()))
    }
}

impl std::fmt::Debug for CryptoEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CryptoEnvelope { .. }")
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    BASE64URL
        .decode(segment)
        .map_err(|e| OAuthError::Format(format!("invalid base64url in {}: {}", name, e)))
}
