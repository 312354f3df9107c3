//! Encrypted credential storage for Google OAuth tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       RefreshGate                        │
//! │  - Cached token or provider refresh      │
//! │  - Single in-flight refresh / workspace  │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore                    │
//! │  - One record per workspace              │
//! │  - Transparent encryption/decryption     │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!    (encrypt)            (decrypt)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       CryptoEnvelope                     │
//! │  - AES-256-GCM                           │
//! │  - Unique IV per token                   │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       KeyValueStore                      │
//! │  - Encrypted tokens only                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use gsc_bridge::credentials::{CredentialStore, CryptoEnvelope};
//!
//! # fn main() -> gsc_bridge::error::Result<()> {
//! let envelope = CryptoEnvelope::from_env()?;
//! let store = CredentialStore::in_memory(envelope);
//!
//! store.set_tokens("demo", "ya29.access", "1//refresh", 1_700_000_000_000, ["scope"])?;
//!
//! if let Some(creds) = store.get_tokens("demo")? {
//!     println!("expires at {}", creds.expiry_date_ms);
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod encryption;
mod refresh;
mod storage;

pub use encryption::{validate_key, CryptoEnvelope, ENCRYPTION_KEY_ENV, KEY_SIZE};
pub use refresh::{RefreshGate, DEFAULT_REFRESH_BUFFER_MS, FALLBACK_EXPIRY_MS};
pub use storage::{CredentialStore, StoredCredential};

/// Plaintext view of a workspace's OAuth credentials.
///
/// Only ever materialized in memory by [`CredentialStore::get_tokens`];
/// never stored in this form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth access token (used for API requests)
    pub access_token: String,

    /// OAuth refresh token (used to obtain new access tokens)
    pub refresh_token: String,

    /// When the access token expires, epoch milliseconds
    pub expiry_date_ms: i64,

    /// Scopes granted to the tokens
    pub scopes: BTreeSet<String>,
}
