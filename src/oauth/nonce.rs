//! Single-use CSRF nonces for the OAuth authorization flow.
//!
//! A nonce is bound to the workspace that started the flow and expires after a
//! TTL (10 minutes by default). Consumption removes the entry whatever the
//! outcome, so a nonce can be checked at most once.

use crate::clock::{Clock, SystemClock};
use crate::storage::{KeyValueStore, MemoryStore};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;

/// Default nonce lifetime (10 minutes).
pub const NONCE_TTL_MS: i64 = 10 * 60 * 1000;

/// Random bytes per nonce.
const NONCE_BYTES: usize = 16;

/// Nonce entry (tracks the workspace that started the flow)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonceEntry {
    pub workspace_id: String,
    pub expires_at: i64,
}

/// Nonce registry with expiry.
#[derive(Clone)]
pub struct NonceRegistry {
    entries: Arc<dyn KeyValueStore<NonceEntry>>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl NonceRegistry {
    pub fn new(
        entries: Arc<dyn KeyValueStore<NonceEntry>>,
        clock: Arc<dyn Clock>,
        ttl_ms: i64,
    ) -> Self {
        Self {
            entries,
            clock,
            ttl_ms,
        }
    }

    /// In-memory registry on the wall clock with the default TTL.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            NONCE_TTL_MS,
        )
    }

    /// Generate a new nonce for `workspace_id` and store it
    ///
    /// Returns 16 random bytes, base64url-encoded.
    pub fn create_nonce(&self, workspace_id: &str) -> String {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let nonce = BASE64URL.encode(bytes);

        self.entries.set(
            &nonce,
            NonceEntry {
                workspace_id: workspace_id.to_string(),
                expires_at: self.clock.now_ms() + self.ttl_ms,
            },
        );

        nonce
    }

    /// Validate and consume a nonce
    ///
    /// Returns true only if the nonce existed, belongs to `workspace_id`, and
    /// has not expired. The entry is removed on every attempt (single-use),
    /// including failed ones.
    pub fn consume_nonce(&self, nonce: &str, workspace_id: &str) -> bool {
        let Some(entry) = self.entries.delete(nonce) else {
            return false;
        };

        if entry.workspace_id != workspace_id {
            tracing::warn!(
                expected = %entry.workspace_id,
                actual = %workspace_id,
                "Nonce presented for a different workspace"
            );
            return false;
        }

        self.clock.now_ms() <= entry.expires_at
    }

    /// Remove expired nonces from abandoned flows
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        let now = self.clock.now_ms();
        self.entries.retain(&|_, entry| now <= entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    /// Get count of outstanding nonces (for debugging/monitoring)
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Background task to periodically clean up expired nonces
pub async fn run_nonce_cleanup(registry: NonceRegistry, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        let removed = registry.cleanup_expired();
        tracing::debug!(
            removed,
            remaining = registry.count(),
            "OAuth nonce cleanup complete"
        );
    }
}
