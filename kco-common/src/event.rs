//! Cluster-facing events and the lifecycle signal the controller watches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a `ClusterEvent`, mirrors the Kubernetes core `Event.type`
/// field's two accepted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// A Kubernetes `Event` the Event Emitter intends to create against the
/// involved object. `generate_name` lets the apiserver assign a unique
/// name the same way `kubectl events` output does for controller-created
/// events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub involved_object_namespace: String,
    pub involved_object_name: String,
    pub involved_object_kind: String,
    pub reason: String,
    pub message: String,
    #[serde(rename = "type")]
    pub type_: EventType,
    pub source_component: String,
    pub first_timestamp: chrono::DateTime<chrono::Utc>,
    pub last_timestamp: chrono::DateTime<chrono::Utc>,
    pub count: u32,
    pub generate_name: String,
}

/// A change notification for one `TargetApp` custom resource, as produced by
/// the watch stream driving the Controller's `run_watch` loop.
#[derive(Debug, Clone)]
pub enum TargetAppEvent {
    Applied {
        namespace: String,
        name: String,
        spec: Value,
    },
    Deleted {
        namespace: String,
        name: String,
    },
}

impl TargetAppEvent {
    pub fn tenant_key(&self) -> String {
        match self {
            TargetAppEvent::Applied { namespace, name, .. }
            | TargetAppEvent::Deleted { namespace, name } => format!("{namespace}/{name}"),
        }
    }
}

/// Observed phase of one TApp's Supervisor, surfaced through `/stats` and
/// (optionally) written back to the custom resource's `status` subresource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TargetAppState {
    Initializing,
    Running,
    Stopping,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAppStatus {
    pub state: TargetAppState,
    pub last_polled: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
    pub actions_executed: u64,
    pub events_generated: u64,
}

impl Default for TargetAppStatus {
    fn default() -> Self {
        Self {
            state: TargetAppState::Initializing,
            last_polled: None,
            last_error: None,
            actions_executed: 0,
            events_generated: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_key_is_namespace_slash_name() {
        let ev = TargetAppEvent::Deleted {
            namespace: "default".into(),
            name: "web".into(),
        };
        assert_eq!(ev.tenant_key(), "default/web");
    }
}
