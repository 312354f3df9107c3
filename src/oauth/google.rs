//! Google OAuth 2.0 provider.
//!
//! Builds the consent URL and talks to Google's token endpoint for the
//! authorization-code and refresh-token grants.

use super::provider::{IdentityProvider, TokenGrant};
use crate::clock::{Clock, SystemClock};
use crate::config::GoogleConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Google Search Console read-only scope
pub const GSC_SCOPE: &str = "https://www.googleapis.com/auth/webmasters.readonly";

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

pub struct GoogleProvider {
    config: GoogleConfig,
    http_client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GoogleConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            clock,
        }
    }

    /// POSTs a grant to the token endpoint and converts the response.
    async fn request_token(&self, form: HashMap<&str, &str>, label: &str) -> Result<TokenGrant> {
        tracing::debug!("{} at {}", label, self.config.token_url);

        let response = self
            .http_client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", label))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(anyhow!("{} failed with status {}: {}", label, status, body));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", label))?;

        tracing::debug!(
            "{} successful, has_refresh_token={}, expires_in={:?}",
            label,
            token_response.refresh_token.is_some(),
            token_response.expires_in
        );

        Ok(self.to_grant(token_response))
    }

    /// Non-positive or overflowing `expires_in` is dropped, so callers fall
    /// back to their default lifetime.
    fn to_grant(&self, response: TokenResponse) -> TokenGrant {
        let now = self.clock.now_ms();
        let expiry_epoch_ms = response.expires_in.and_then(|seconds| {
            let expiry = (seconds > 0)
                .then(|| seconds.checked_mul(1000))
                .flatten()
                .and_then(|ms| now.checked_add(ms));
            if expiry.is_none() {
                tracing::warn!(expires_in = seconds, "Ignoring unusable expires_in");
            }
            expiry
        });

        TokenGrant {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expiry_epoch_ms,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    /// Offline access with forced consent so Google returns a refresh token.
    fn authorization_url(&self, state: &str) -> String {
        let scopes = self.config.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let mut form = HashMap::new();
        form.insert("grant_type", "authorization_code");
        form.insert("code", code);
        form.insert("redirect_uri", self.config.redirect_uri.as_str());
        form.insert("client_id", self.config.client_id.as_str());
        form.insert("client_secret", self.config.client_secret.as_str());

        self.request_token(form, "Token exchange").await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        let mut form = HashMap::new();
        form.insert("grant_type", "refresh_token");
        form.insert("refresh_token", refresh_token);
        form.insert("client_id", self.config.client_id.as_str());
        form.insert("client_secret", self.config.client_secret.as_str());

        self.request_token(form, "Token refresh").await
    }
}
