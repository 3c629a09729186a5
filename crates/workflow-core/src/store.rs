//! An ambient, cross-run key/value side-channel handed to executors via
//! [`crate::executor::WorkflowContext::store`]. Unlike [`crate::state::StateManager`],
//! this data is not part of any checkpoint and is not scoped to a single
//! run — it is for data that should outlive a run's lifecycle entirely
//! (e.g. a shared cache an executor wants to reuse across separate runs of
//! the same workflow).
//!
//! This is ambient infrastructure, not part of the superstep-scoped state
//! model: the state manager remains the sole owner of checkpointed state.

use parking_lot::RwLock;
use std::collections::HashMap;

/// A namespace plus key, analogous to the state manager's `ScopeId` but
/// with no notion of an owning executor or a superstep.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub namespace: String,
    pub key: String,
}

impl StoreKey {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

/// An in-process, process-lifetime key/value store.
#[derive(Default)]
pub struct Store {
    entries: RwLock<HashMap<StoreKey, serde_json::Value>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StoreKey) -> Option<serde_json::Value> {
        self.entries.read().get(key).cloned()
    }

    pub fn put(&self, key: StoreKey, value: serde_json::Value) {
        self.entries.write().insert(key, value);
    }

    pub fn delete(&self, key: &StoreKey) {
        self.entries.write().remove(key);
    }

    pub fn list_namespace(&self, namespace: &str) -> Vec<(StoreKey, serde_json::Value)> {
        self.entries
            .read()
            .iter()
            .filter(|(k, _)| k.namespace == namespace)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = Store::new();
        let key = StoreKey::new("ns", "a");
        store.put(key.clone(), serde_json::json!(42));
        assert_eq!(store.get(&key), Some(serde_json::json!(42)));
    }

    #[test]
    fn list_namespace_filters_by_prefix_key() {
        let store = Store::new();
        store.put(StoreKey::new("ns1", "a"), serde_json::json!(1));
        store.put(StoreKey::new("ns2", "b"), serde_json::json!(2));
        let listed = store.list_namespace("ns1");
        assert_eq!(listed.len(), 1);
    }
}
