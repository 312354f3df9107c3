//! Access-token freshness gate.
//!
//! A cached token is served while `now < expiry - buffer`. Inside the buffer
//! (or past expiry) the stored refresh token is traded for a new access token
//! and the result is written back. Concurrent callers for the same workspace
//! share one provider call: the first takes the workspace lock and refreshes,
//! the rest wait on the lock and then find the fresh token.

use super::CredentialStore;
use crate::clock::Clock;
use crate::error::{OAuthError, Result};
use crate::oauth::IdentityProvider;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Refresh when the token expires within this window (60 seconds).
pub const DEFAULT_REFRESH_BUFFER_MS: i64 = 60_000;

/// Expiry assumed when the provider does not report one (55 minutes).
pub const FALLBACK_EXPIRY_MS: i64 = 55 * 60 * 1000;

pub struct RefreshGate {
    store: Arc<CredentialStore>,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    buffer_ms: i64,
    fallback_expiry_ms: i64,
}

impl RefreshGate {
    pub fn new(
        store: Arc<CredentialStore>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            buffer_ms: DEFAULT_REFRESH_BUFFER_MS,
            fallback_expiry_ms: FALLBACK_EXPIRY_MS,
        }
    }

    pub fn with_buffer_ms(mut self, buffer_ms: i64) -> Self {
        self.buffer_ms = buffer_ms;
        self
    }

    pub fn with_fallback_expiry_ms(mut self, fallback_expiry_ms: i64) -> Self {
        self.fallback_expiry_ms = fallback_expiry_ms;
        self
    }

    fn is_fresh(&self, expiry_date_ms: i64) -> bool {
        self.clock.now_ms() < expiry_date_ms.saturating_sub(self.buffer_ms)
    }

    /// Returns an access token that is valid for at least the buffer window.
    ///
    /// # Returns
    /// * `Err(NotConnected)` - No credential stored for the workspace
    /// * `Err(RefreshFailed)` - Provider refused or returned no access token
    pub async fn get_valid_access_token(&self, workspace_id: &str) -> Result<String> {
        let existing = self
            .store
            .get_tokens(workspace_id)?
            .ok_or_else(|| OAuthError::NotConnected(workspace_id.to_string()))?;

        if self.is_fresh(existing.expiry_date_ms) {
            return Ok(existing.access_token);
        }

        let _guard = self.store.lock_workspace(workspace_id).await;

        // Another caller may have refreshed while we waited on the lock
        let existing = self
            .store
            .get_tokens(workspace_id)?
            .ok_or_else(|| OAuthError::NotConnected(workspace_id.to_string()))?;

        if self.is_fresh(existing.expiry_date_ms) {
            debug!(workspace_id = %workspace_id, "Token refreshed by concurrent caller");
            return Ok(existing.access_token);
        }

        info!(workspace_id = %workspace_id, "Refreshing OAuth access token");

        let grant = self
            .provider
            .refresh_access_token(&existing.refresh_token)
            .await
            .map_err(|e| {
                warn!(workspace_id = %workspace_id, error = %e, "Token refresh failed");
                OAuthError::RefreshFailed(e.to_string())
            })?;

        let access_token = grant
            .usable_access_token()
            .ok_or_else(|| {
                OAuthError::RefreshFailed("provider returned no access token".to_string())
            })?
            .to_string();

        let expiry_date_ms = grant
            .expiry_epoch_ms
            .unwrap_or_else(|| self.clock.now_ms().saturating_add(self.fallback_expiry_ms));

        // Keep the existing refresh token if the provider did not rotate it
        let refresh_token = grant
            .usable_refresh_token()
            .unwrap_or(&existing.refresh_token);

        self.store.set_tokens(
            workspace_id,
            &access_token,
            refresh_token,
            expiry_date_ms,
            existing.scopes,
        )?;

        info!(
            workspace_id = %workspace_id,
            expiry_date_ms,
            rotated_refresh_token = grant.usable_refresh_token().is_some(),
            "OAuth access token refreshed"
        );

        Ok(access_token)
    }
}
