//! Key-value storage seam for nonces and credentials.
//!
//! Protocol logic only talks to [`KeyValueStore`]; the in-memory
//! [`MemoryStore`] is the default backend and a durable store can be slotted
//! in without touching the nonce or credential code.

use dashmap::DashMap;

/// Minimal keyed storage used by the nonce registry and credential store.
///
/// Implementations must make `delete` an atomic remove-and-return: two
/// concurrent callers deleting the same key see the value at most once.
pub trait KeyValueStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;

    /// Inserts or replaces the value for `key` (last write wins).
    fn set(&self, key: &str, value: V);

    /// Removes `key`, returning the previous value if there was one.
    fn delete(&self, key: &str) -> Option<V>;

    /// Keeps only entries for which `keep` returns true.
    fn retain(&self, keep: &dyn Fn(&str, &V) -> bool);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store backed by a sharded concurrent map.
///
/// State is process-local and lost on restart.
pub struct MemoryStore<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> KeyValueStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    fn retain(&self, keep: &dyn Fn(&str, &V) -> bool) {
        self.entries.retain(|key, value| keep(key, value));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
