//! Per-tenant state history, guarded by a single mutex per the specified
//! "one store, one lock" contract — unlike the Rate Limiter, snapshot
//! comparisons are pure and brief enough that an actor mailbox would only
//! add indirection.

use kco_common::state::{StateChange, StateSnapshot};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct StateStore {
    snapshots: Mutex<HashMap<String, StateSnapshot>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `new_snapshot` for `tenant_key`, returning the `StateChange`
    /// against whatever snapshot (if any) was stored before.
    pub fn record(&self, tenant_key: &str, new_snapshot: StateSnapshot) -> StateChange {
        let mut guard = self.snapshots.lock().unwrap();
        let old_snapshot = guard.get(tenant_key).cloned();
        let change = StateChange::compute(tenant_key.to_string(), old_snapshot, new_snapshot.clone());
        guard.insert(tenant_key.to_string(), new_snapshot);
        change
    }

    pub fn get(&self, tenant_key: &str) -> Option<StateSnapshot> {
        self.snapshots.lock().unwrap().get(tenant_key).cloned()
    }

    pub fn remove(&self, tenant_key: &str) -> Option<StateSnapshot> {
        self.snapshots.lock().unwrap().remove(tenant_key)
    }

    pub fn tenant_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_observation_is_initial_with_no_changed_paths() {
        let store = StateStore::new();
        let snap = StateSnapshot::new(chrono::Utc::now(), json!({"a": 1}));
        let change = store.record("ns/x", snap);
        assert!(change.is_initial());
        assert!(change.changed_paths.is_empty());
    }

    #[test]
    fn second_observation_diffs_against_the_first() {
        let store = StateStore::new();
        store.record("ns/x", StateSnapshot::new(chrono::Utc::now(), json!({"a": 1})));
        let change = store.record("ns/x", StateSnapshot::new(chrono::Utc::now(), json!({"a": 2})));
        assert!(!change.is_initial());
        assert!(change.changed_paths.contains("a"));
    }

    #[test]
    fn remove_forgets_the_tenant() {
        let store = StateStore::new();
        store.record("ns/x", StateSnapshot::new(chrono::Utc::now(), json!({"a": 1})));
        assert!(store.remove("ns/x").is_some());
        assert!(store.get("ns/x").is_none());
    }
}
