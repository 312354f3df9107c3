//! Error taxonomy for the credential security core.
//!
//! Every failure is returned to the immediate caller as a typed variant so the
//! HTTP layer can classify it. Nothing here is retried internally.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, OAuthError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// Missing or malformed key material / configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed encrypted blob or state token.
    #[error("malformed input: {0}")]
    Format(String),

    /// AEAD tag verification failed (tampered data or wrong key).
    #[error("authentication failed: ciphertext was tampered with or the key changed")]
    Authentication,

    /// State token signature mismatch.
    #[error("invalid state signature")]
    InvalidSignature,

    /// Nonce missing, expired, bound to another workspace, or already used.
    #[error("invalid or expired state nonce")]
    ExpiredOrConsumed,

    /// No credential stored for the workspace.
    #[error("workspace '{0}' is not connected")]
    NotConnected(String),

    /// The provider refused the refresh or returned no usable access token.
    #[error("failed to refresh access token: {0}")]
    RefreshFailed(String),

    /// The provider refused the authorization code or returned no access token.
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    /// The provider omitted the refresh token; the user has to consent again.
    #[error("no refresh token returned; revoke access and reconnect with consent")]
    MissingRefreshToken,
}
