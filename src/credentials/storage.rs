//! Per-workspace credential records, encrypted at rest.
//!
//! Access and refresh tokens are encrypted independently (each with its own
//! IV) before they reach the backing [`KeyValueStore`]. Exactly one record
//! exists per workspace; writes overwrite.

use super::{CryptoEnvelope, Credentials};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::storage::{KeyValueStore, MemoryStore};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Encrypted credential record as held by the backing store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredCredential {
    pub access_token_enc: String,
    pub refresh_token_enc: String,
    pub expiry_date_ms: i64,
    pub scopes: BTreeSet<String>,
    pub updated_at: i64,
}

/// Credential storage keyed by workspace.
///
/// # Thread Safety
/// - Single-key reads and writes are atomic in the backing store
/// - Read-modify-write sequences (refresh, callback) hold the workspace lock
///   from [`lock_workspace`](Self::lock_workspace) so one writer at a time
///   touches a workspace
pub struct CredentialStore {
    records: Arc<dyn KeyValueStore<StoredCredential>>,
    envelope: CryptoEnvelope,
    clock: Arc<dyn Clock>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialStore {
    pub fn new(
        records: Arc<dyn KeyValueStore<StoredCredential>>,
        envelope: CryptoEnvelope,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            envelope,
            clock,
            locks: DashMap::new(),
        }
    }

    /// In-memory store using the wall clock.
    pub fn in_memory(envelope: CryptoEnvelope) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            envelope,
            Arc::new(SystemClock),
        )
    }

    /// Encrypts both tokens and replaces any existing record for the workspace.
    pub fn set_tokens<I, S>(
        &self,
        workspace_id: &str,
        access_token: &str,
        refresh_token: &str,
        expiry_date_ms: i64,
        scopes: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record = StoredCredential {
            access_token_enc: self.envelope.encrypt(access_token)?,
            refresh_token_enc: self.envelope.encrypt(refresh_token)?,
            expiry_date_ms,
            scopes: scopes.into_iter().map(Into::into).collect(),
            updated_at: self.clock.now_ms(),
        };

        self.records.set(workspace_id, record);

        tracing::debug!(
            workspace_id = %workspace_id,
            expiry_date_ms,
            "Stored encrypted credentials"
        );
        Ok(())
    }

    /// Decrypts and returns the workspace's credentials, if connected.
    ///
    /// # Returns
    /// * `Ok(None)` - No record for the workspace
    /// * `Err(Authentication | Format)` - Stored blob corrupted or key changed
    pub fn get_tokens(&self, workspace_id: &str) -> Result<Option<Credentials>> {
        let Some(record) = self.records.get(workspace_id) else {
            return Ok(None);
        };

        Ok(Some(Credentials {
            access_token: self.envelope.decrypt(&record.access_token_enc)?,
            refresh_token: self.envelope.decrypt(&record.refresh_token_enc)?,
            expiry_date_ms: record.expiry_date_ms,
            scopes: record.scopes,
        }))
    }

    pub fn is_connected(&self, workspace_id: &str) -> bool {
        self.records.get(workspace_id).is_some()
    }

    /// Acquires the per-workspace write lock.
    ///
    /// Held across read-refresh-write so concurrent refreshes for one
    /// workspace collapse into a single provider call.
    pub async fn lock_workspace(&self, workspace_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(workspace_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
