//! OAuth 2.0 authorization-code flow for connecting a workspace to Google.
//!
//! 1. `start_authorization(workspace)` → nonce issued, state signed, consent URL returned
//! 2. User authorizes on Google's site
//! 3. Google redirects back with `code` and `state`
//! 4. `handle_callback(code, state)` → state verified, nonce consumed (single use),
//!    code exchanged, tokens stored encrypted
//! 5. API calls go through [`RefreshGate`](crate::credentials::RefreshGate)

mod google;
mod nonce;
mod provider;
mod state;

pub use google::{GoogleProvider, GSC_SCOPE};
pub use nonce::{run_nonce_cleanup, NonceEntry, NonceRegistry, NONCE_TTL_MS};
pub use provider::{IdentityProvider, TokenGrant};
pub use state::{OAuthState, StateSigner, STATE_SECRET_ENV};

use crate::clock::Clock;
use crate::credentials::{CredentialStore, FALLBACK_EXPIRY_MS};
use crate::error::{OAuthError, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives the authorization-code flow on top of the security primitives.
pub struct OAuthFlow {
    nonces: NonceRegistry,
    signer: StateSigner,
    provider: Arc<dyn IdentityProvider>,
    credentials: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    scopes: Vec<String>,
    fallback_expiry_ms: i64,
}

impl OAuthFlow {
    pub fn new(
        nonces: NonceRegistry,
        signer: StateSigner,
        provider: Arc<dyn IdentityProvider>,
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            nonces,
            signer,
            provider,
            credentials,
            clock,
            scopes,
            fallback_expiry_ms: FALLBACK_EXPIRY_MS,
        }
    }

    pub fn with_fallback_expiry_ms(mut self, fallback_expiry_ms: i64) -> Self {
        self.fallback_expiry_ms = fallback_expiry_ms;
        self
    }

    /// Returns the provider consent URL for `workspace_id`.
    ///
    /// # Security
    /// - Fresh single-use nonce bound to the workspace
    /// - State is HMAC-signed, so the workspace cannot be swapped in transit
    pub fn start_authorization(&self, workspace_id: &str) -> Result<String> {
        let nonce = self.nonces.create_nonce(workspace_id);
        let state = self.signer.sign_state(&OAuthState {
            workspace_id: workspace_id.to_string(),
            nonce,
            issued_at: self.clock.now_ms(),
        })?;

        info!(workspace_id = %workspace_id, "Redirecting to OAuth provider");
        Ok(self.provider.authorization_url(&state))
    }

    /// Completes the flow and stores the workspace's credentials.
    ///
    /// Returns the workspace id recovered from the verified state.
    ///
    /// # Returns
    /// * `Err(Format | InvalidSignature)` - State token malformed or forged
    /// * `Err(ExpiredOrConsumed)` - Nonce unknown, expired, or replayed
    /// * `Err(ExchangeFailed)` - Provider rejected the code or sent no access token
    /// * `Err(MissingRefreshToken)` - Provider sent no refresh token (re-consent needed)
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<String> {
        let payload = self.signer.verify_state(state).map_err(|e| {
            warn!(error = %e, "Rejected OAuth state");
            e
        })?;
        let workspace_id = payload.workspace_id;

        if !self.nonces.consume_nonce(&payload.nonce, &workspace_id) {
            warn!(workspace_id = %workspace_id, "Invalid or expired OAuth nonce");
            return Err(OAuthError::ExpiredOrConsumed);
        }

        debug!(workspace_id = %workspace_id, "OAuth state validated, exchanging code");

        let grant = self.provider.exchange_code(code).await.map_err(|e| {
            error!(workspace_id = %workspace_id, error = %e, "Token exchange failed");
            OAuthError::ExchangeFailed(e.to_string())
        })?;

        let access_token = grant.usable_access_token().ok_or_else(|| {
            OAuthError::ExchangeFailed("provider returned no access token".to_string())
        })?;
        let refresh_token = grant.usable_refresh_token().ok_or_else(|| {
            warn!(workspace_id = %workspace_id, "Provider omitted refresh token");
            OAuthError::MissingRefreshToken
        })?;
        let expiry_date_ms = grant
            .expiry_epoch_ms
            .unwrap_or_else(|| self.clock.now_ms().saturating_add(self.fallback_expiry_ms));

        let _guard = self.credentials.lock_workspace(&workspace_id).await;
        self.credentials.set_tokens(
            &workspace_id,
            access_token,
            refresh_token,
            expiry_date_ms,
            self.scopes.iter().cloned(),
        )?;

        info!(workspace_id = %workspace_id, "OAuth flow completed successfully");
        Ok(workspace_id)
    }
}
