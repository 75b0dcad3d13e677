//! Content-addressed state snapshots and the structural diff between them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// A point-in-time capture of a TApp's observed state, plus a checksum over
/// its canonical JSON form so two snapshots can be compared cheaply before
/// falling back to the full structural diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub data: serde_json::Value,
    pub checksum: String,
}

impl StateSnapshot {
    pub fn new(timestamp: chrono::DateTime<chrono::Utc>, data: serde_json::Value) -> Self {
        let checksum = checksum_of(&data);
        Self {
            timestamp,
            data,
            checksum,
        }
    }
}

/// SHA-256 hex digest of `value`'s canonical form: object keys sorted,
/// no insignificant whitespace. Matches the reference operator's
/// `hashlib.sha256(json.dumps(data, sort_keys=True, separators=(",", ":")))`
/// byte for byte, since `serde_json::Value`'s `Map` is already key-sorted
/// (the `preserve_order` feature is not enabled) and its compact serializer
/// emits no extra whitespace.
pub fn checksum_of(value: &serde_json::Value) -> String {
    let canonical = serde_json::to_vec(value).expect("Value serialization cannot fail");
    let digest = Sha256::digest(&canonical);
    hex::encode(digest)
}

/// The result of comparing two snapshots for one tenant: which dotted paths
/// changed, and the before/after snapshots that produced the diff.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub tenant_key: String,
    pub old_snapshot: Option<StateSnapshot>,
    pub new_snapshot: StateSnapshot,
    pub changed_paths: BTreeSet<String>,
}

impl StateChange {
    /// True when there was no prior snapshot to diff against — the first
    /// observation of a tenant's state.
    pub fn is_initial(&self) -> bool {
        self.old_snapshot.is_none()
    }

    pub fn has_changes(&self) -> bool {
        self.is_initial() || !self.changed_paths.is_empty()
    }

    pub fn compute(
        tenant_key: String,
        old_snapshot: Option<StateSnapshot>,
        new_snapshot: StateSnapshot,
    ) -> Self {
        let changed_paths = match &old_snapshot {
            None => BTreeSet::new(),
            Some(old) if old.checksum == new_snapshot.checksum => BTreeSet::new(),
            Some(old) => {
                let mut paths = BTreeSet::new();
                diff_values("", &old.data, &new_snapshot.data, &mut paths);
                paths
            }
        };
        Self {
            tenant_key,
            old_snapshot,
            new_snapshot,
            changed_paths,
        }
    }
}

/// Recursively walks two JSON values, recording dotted paths that differ.
/// Objects are compared key by key over the union of both sides' keys.
/// Arrays and scalars are compared as wholes — a single element changing
/// inside an array marks the whole array's path as changed, rather than
/// diffing by index, matching the reference implementation's coarse-grained
/// array handling.
fn diff_values(path: &str, old: &serde_json::Value, new: &serde_json::Value, out: &mut BTreeSet<String>) {
    use serde_json::Value;
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut keys: BTreeSet<&String> = old_map.keys().collect();
            keys.extend(new_map.keys());
            for key in keys {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match (old_map.get(key), new_map.get(key)) {
                    (Some(o), Some(n)) => diff_values(&child_path, o, n, out),
                    _ => {
                        out.insert(child_path);
                    }
                }
            }
        }
        _ => {
            if old != new {
                out.insert(if path.is_empty() {
                    "$".to_string()
                } else {
                    path.to_string()
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checksum_is_stable_across_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(checksum_of(&a), checksum_of(&b));
    }

    #[test]
    fn diff_reports_nested_dotted_paths() {
        let old = json!({"status": {"ready": true, "replicas": 3}, "kind": "Deployment"});
        let new = json!({"status": {"ready": false, "replicas": 3}, "kind": "Deployment"});
        let mut out = BTreeSet::new();
        diff_values("", &old, &new, &mut out);
        assert_eq!(out, BTreeSet::from(["status.ready".to_string()]));
    }

    #[test]
    fn diff_treats_array_change_as_single_path() {
        let old = json!({"items": [1, 2, 3]});
        let new = json!({"items": [1, 2, 4]});
        let mut out = BTreeSet::new();
        diff_values("", &old, &new, &mut out);
        assert_eq!(out, BTreeSet::from(["items".to_string()]));
    }

    #[test]
    fn added_and_removed_keys_are_reported() {
        let old = json!({"a": 1});
        let new = json!({"b": 2});
        let mut out = BTreeSet::new();
        diff_values("", &old, &new, &mut out);
        assert_eq!(out, BTreeSet::from(["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn initial_change_has_no_changed_paths_but_has_changes() {
        let snap = StateSnapshot::new(chrono::Utc::now(), json!({"a": 1}));
        let change = StateChange::compute("ns/x".to_string(), None, snap);
        assert!(change.is_initial());
        assert!(change.has_changes());
        assert!(change.changed_paths.is_empty());
    }
}
