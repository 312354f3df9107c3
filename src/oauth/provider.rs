//! Identity provider capability.
//!
//! The core never talks HTTP itself; it depends on an [`IdentityProvider`]
//! for building the consent URL and for the two token endpoint calls.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Tokens returned by the provider's token endpoint.
///
/// Every field is optional because providers omit them in practice: Google
/// drops `refresh_token` when the user consented earlier, and refresh
/// responses may carry no expiry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Absolute expiry, epoch milliseconds
    pub expiry_epoch_ms: Option<i64>,
}

impl TokenGrant {
    /// Returns the access token if present and non-empty.
    pub fn usable_access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// OAuth 2.0 authorization-code provider.
///
/// Implementations bound their own network timeouts; the core does not
/// cancel or retry these calls.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent page URL carrying the signed `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    /// Mints a new access token from a refresh token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant>;
}
