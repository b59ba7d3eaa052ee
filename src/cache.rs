//! Query cache
//!
//! Holds fetched data keyed by query name. Owners pass it explicitly to
//! whatever reads or invalidates it; there is no process-wide instance.

use indexmap::IndexMap;
use tracing::debug;

pub struct QueryCache<V> {
    entries: IndexMap<String, V>,
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> QueryCache<V> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    /// Discards the entry so the next read goes back to the source.
    pub fn invalidate(&mut self, key: &str) -> Option<V> {
        let removed = self.entries.shift_remove(key);
        debug!(key, present = removed.is_some(), "invalidate query");
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
