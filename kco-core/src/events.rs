//! Builds and deduplicates the Kubernetes `Event`s the controller emits
//! against a TApp's target resource.

use kco_common::action::{ActionResult, ActionStatus};
use kco_common::event::{ClusterEvent, EventType};
use kco_common::state::StateChange;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const MAX_LISTED_PATHS: usize = 5;

/// Renders a state change's `changed_paths` the way the reference
/// operator's event generator does: list up to `MAX_LISTED_PATHS`, then
/// summarize the rest as "and N more" — this wording is load-bearing for the
/// dedup key, not cosmetic, since two events differing only in truncated
/// tail count must still hash identically.
pub fn format_changed_paths(change: &StateChange) -> String {
    let mut paths: Vec<&String> = change.changed_paths.iter().collect();
    paths.sort();
    if paths.len() <= MAX_LISTED_PATHS {
        paths
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        let head: Vec<&str> = paths[..MAX_LISTED_PATHS].iter().map(|s| s.as_str()).collect();
        format!("{} (and {} more)", head.join(", "), paths.len() - MAX_LISTED_PATHS)
    }
}

fn dedup_key(tenant_key: &str, reason: &str, detail: &str) -> String {
    format!("{tenant_key}|{reason}|{detail}")
}

/// Emits `ClusterEvent`s for state changes and action outcomes, suppressing
/// exact repeats of the same (tenant, reason, detail) triple within a
/// configured window so a flapping condition doesn't spam the event log.
pub struct EventEmitter {
    recent: Mutex<HashMap<String, Instant>>,
    dedup_window: Duration,
    source_component: String,
}

impl EventEmitter {
    pub fn new(dedup_window: Duration) -> Self {
        Self {
            recent: Mutex::new(HashMap::new()),
            dedup_window,
            source_component: "kco-operator".to_string(),
        }
    }

    fn should_emit(&self, key: &str, now: Instant) -> bool {
        let mut guard = self.recent.lock().unwrap();
        match guard.get(key) {
            Some(last) if now.saturating_duration_since(*last) < self.dedup_window => false,
            _ => {
                guard.insert(key.to_string(), now);
                true
            }
        }
    }

    /// Sweep dedup entries older than the window; returns the number evicted.
    pub fn cleanup(&self, now: Instant) -> usize {
        let mut guard = self.recent.lock().unwrap();
        let before = guard.len();
        guard.retain(|_, last| now.saturating_duration_since(*last) < self.dedup_window);
        before - guard.len()
    }

    /// Build the `StateChanged` event for a non-initial state change, or
    /// `None` if it was deduplicated or carried no changes.
    pub fn for_state_change(
        &self,
        change: &StateChange,
        involved_kind: &str,
    ) -> Option<ClusterEvent> {
        if !change.has_changes() || change.is_initial() {
            return None;
        }
        let detail = format_changed_paths(change);
        let key = dedup_key(&change.tenant_key, "StateChanged", &detail);
        if !self.should_emit(&key, Instant::now()) {
            return None;
        }
        let (namespace, name) = split_tenant_key(&change.tenant_key);
        let now = chrono::Utc::now();
        Some(ClusterEvent {
            involved_object_namespace: namespace,
            involved_object_name: name,
            involved_object_kind: involved_kind.to_string(),
            reason: "StateChanged".to_string(),
            message: format!("observed state change: {detail}"),
            type_: EventType::Normal,
            source_component: self.source_component.clone(),
            first_timestamp: now,
            last_timestamp: now,
            count: 1,
            generate_name: "kco-state-".to_string(),
        })
    }

    /// Build the event for one action's result.
    pub fn for_action_result(
        &self,
        tenant_key: &str,
        action_name: &str,
        result: &ActionResult,
        involved_kind: &str,
    ) -> Option<ClusterEvent> {
        let reason = match result.status {
            ActionStatus::Success => format!("{action_name}Succeeded"),
            ActionStatus::Failed => format!("{action_name}Failed"),
            ActionStatus::Timeout => format!("{action_name}TimedOut"),
            ActionStatus::Skipped => format!("{action_name}Skipped"),
        };
        let key = dedup_key(tenant_key, &reason, &result.message);
        if !self.should_emit(&key, Instant::now()) {
            return None;
        }
        let (namespace, name) = split_tenant_key(tenant_key);
        let now = chrono::Utc::now();
        Some(ClusterEvent {
            involved_object_namespace: namespace,
            involved_object_name: name,
            involved_object_kind: involved_kind.to_string(),
            reason,
            message: result.message.clone(),
            type_: result.event_type(),
            source_component: self.source_component.clone(),
            first_timestamp: now,
            last_timestamp: now,
            count: 1,
            generate_name: "kco-action-".to_string(),
        })
    }
}

fn split_tenant_key(tenant_key: &str) -> (String, String) {
    match tenant_key.split_once('/') {
        Some((ns, name)) => (ns.to_string(), name.to_string()),
        None => (String::new(), tenant_key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kco_common::state::StateSnapshot;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn change_with_paths(paths: &[&str]) -> StateChange {
        StateChange {
            tenant_key: "default/web".to_string(),
            old_snapshot: Some(StateSnapshot::new(chrono::Utc::now(), json!({}))),
            new_snapshot: StateSnapshot::new(chrono::Utc::now(), json!({})),
            changed_paths: paths.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn truncates_after_five_paths() {
        let change = change_with_paths(&["a", "b", "c", "d", "e", "f", "g"]);
        let formatted = format_changed_paths(&change);
        assert!(formatted.contains("and 2 more"));
    }

    #[test]
    fn lists_all_paths_when_five_or_fewer() {
        let change = change_with_paths(&["a", "b"]);
        assert_eq!(format_changed_paths(&change), "a, b");
    }

    #[test]
    fn emitter_suppresses_exact_repeat_within_window() {
        let emitter = EventEmitter::new(Duration::from_secs(300));
        let change = change_with_paths(&["status.ready"]);
        let first = emitter.for_state_change(&change, "Deployment");
        let second = emitter.for_state_change(&change, "Deployment");
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn initial_state_change_emits_nothing() {
        let emitter = EventEmitter::new(Duration::from_secs(300));
        let change = StateChange {
            tenant_key: "default/web".to_string(),
            old_snapshot: None,
            new_snapshot: StateSnapshot::new(chrono::Utc::now(), json!({})),
            changed_paths: BTreeSet::new(),
        };
        assert!(emitter.for_state_change(&change, "Deployment").is_none());
    }
}
