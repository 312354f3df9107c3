//! Service configuration.
//!
//! Non-secret settings come from an optional TOML file (every section has
//! defaults) and are then overridden from the environment. Secrets are only
//! ever read from the environment.

use crate::credentials::{validate_key, CryptoEnvelope, ENCRYPTION_KEY_ENV};
use crate::error::{OAuthError, Result};
use crate::oauth::{StateSigner, GSC_SCOPE, STATE_SECRET_ENV};
use serde::Deserialize;

/// Environment variable naming the optional TOML config file
pub const CONFIG_PATH_ENV: &str = "GSC_BRIDGE_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Frontend origin (CORS and post-connect redirect target)
    pub app_url: String,
    /// Maximum request body size
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            app_url: "http://localhost:5173".to_string(),
            body_limit_bytes: 1_048_576, // 1 MB
        }
    }
}

/// OAuth flow timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// How long a CSRF nonce stays valid
    pub nonce_ttl_seconds: i64,
    /// How often expired nonces are swept
    pub cleanup_interval_seconds: u64,
    /// Refresh access tokens this close to expiry
    pub refresh_buffer_seconds: i64,
    /// Assumed token lifetime when the provider reports none
    pub fallback_expiry_seconds: i64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            nonce_ttl_seconds: 600,
            cleanup_interval_seconds: 60,
            refresh_buffer_seconds: 60,
            fallback_expiry_seconds: 55 * 60,
        }
    }
}

/// `OAuthConfig` durations converted to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OAuthTimings {
    pub nonce_ttl_ms: i64,
    pub refresh_buffer_ms: i64,
    pub fallback_expiry_ms: i64,
}

fn seconds_to_ms(name: &str, seconds: i64) -> Result<i64> {
    seconds
        .checked_mul(1000)
        .ok_or_else(|| OAuthError::Config(format!("{} is too large", name)))
}

impl OAuthConfig {
    /// Validated millisecond durations.
    ///
    /// TTL and fallback lifetime must be positive, the buffer non-negative
    /// and shorter than the fallback lifetime.
    pub fn timings(&self) -> Result<OAuthTimings> {
        if self.nonce_ttl_seconds <= 0 {
            return Err(OAuthError::Config("nonce_ttl_seconds must be positive".to_string()));
        }
        if self.refresh_buffer_seconds < 0 {
            return Err(OAuthError::Config(
                "refresh_buffer_seconds must not be negative".to_string(),
            ));
        }
        if self.fallback_expiry_seconds <= 0 {
            return Err(OAuthError::Config(
                "fallback_expiry_seconds must be positive".to_string(),
            ));
        }
        if self.refresh_buffer_seconds >= self.fallback_expiry_seconds {
            return Err(OAuthError::Config(
                "refresh_buffer_seconds must be shorter than fallback_expiry_seconds".to_string(),
            ));
        }

        Ok(OAuthTimings {
            nonce_ttl_ms: seconds_to_ms("nonce_ttl_seconds", self.nonce_ttl_seconds)?,
            refresh_buffer_ms: seconds_to_ms("refresh_buffer_seconds", self.refresh_buffer_seconds)?,
            fallback_expiry_ms: seconds_to_ms(
                "fallback_expiry_seconds",
                self.fallback_expiry_seconds,
            )?,
        })
    }
}

/// Google OAuth client and API endpoints
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Base URL for the Webmasters API (sites listing)
    pub api_base_url: String,
    /// Base URL for the Search Console URL Inspection API
    pub inspection_base_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![GSC_SCOPE.to_string()],
            api_base_url: "https://www.googleapis.com".to_string(),
            inspection_base_url: "https://searchconsole.googleapis.com".to_string(),
        }
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl AppConfig {
    /// Load from the TOML file at `path` (if any), then apply env overrides.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override settings from environment-style variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %v, "Ignoring invalid PORT"),
            }
        }
        if let Some(v) = lookup("APP_URL") {
            self.server.app_url = v;
        }
        if let Some(v) = lookup("GOOGLE_OAUTH_CLIENT_ID") {
            self.google.client_id = v;
        }
        if let Some(v) = lookup("GOOGLE_OAUTH_CLIENT_SECRET") {
            self.google.client_secret = v;
        }
        if let Some(v) = lookup("GOOGLE_OAUTH_REDIRECT_URI") {
            self.google.redirect_uri = v;
        }
    }

    /// Checks that the Google client settings required for the flow are set
    /// and that the OAuth timings are usable.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("GOOGLE_OAUTH_CLIENT_ID", &self.google.client_id),
            ("GOOGLE_OAUTH_CLIENT_SECRET", &self.google.client_secret),
            ("GOOGLE_OAUTH_REDIRECT_URI", &self.google.redirect_uri),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(OAuthError::Config(format!("missing {}", name)));
            }
        }
        self.oauth.timings()?;
        if self.oauth.cleanup_interval_seconds == 0 {
            return Err(OAuthError::Config(
                "cleanup_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Key material read from the environment.
pub struct Secrets {
    /// Base64-encoded 32-byte AEAD master key
    pub encryption_key: String,
    /// Dedicated HMAC secret for state tokens
    pub state_secret: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let encryption_key = lookup(ENCRYPTION_KEY_ENV).ok_or_else(|| {
            OAuthError::Config(format!(
                "missing {} env var (base64 32 bytes)",
                ENCRYPTION_KEY_ENV
            ))
        })?;
        let state_secret = lookup(STATE_SECRET_ENV).filter(|s| !s.is_empty());

        Ok(Self {
            encryption_key,
            state_secret,
        })
    }

    pub fn envelope(&self) -> Result<CryptoEnvelope> {
        CryptoEnvelope::from_base64_key(&self.encryption_key)
    }

    /// Signing key: the dedicated secret if set, otherwise derived from the
    /// master key so encryption and signing never share key bytes.
    pub fn state_signer(&self) -> Result<StateSigner> {
        match &self.state_secret {
            Some(secret) => StateSigner::new(secret.as_bytes().to_vec()),
            None => StateSigner::derive_from_master(&validate_key(&self.encryption_key)?),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    use anyhow::Context;

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}
