//! The context an Effector runs with and the result it hands back to the
//! Event Emitter.

use crate::config::TAppConfig;
use crate::state::StateChange;
use serde::{Deserialize, Serialize};

/// Terminal status of one action execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
    Timeout,
    Skipped,
}

/// Everything an `Effector::execute` needs: the state change that fired its
/// trigger, the binding's own parameters, and the owning TApp's config for
/// cluster addressing (namespace, selector).
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub state_change: StateChange,
    pub action_name: String,
    pub parameters: serde_json::Value,
    pub tapp_config: TAppConfig,
}

/// What an Effector reports back after running. `details` is free-form and
/// becomes part of the generated `ClusterEvent`'s message when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub duration_seconds: f64,
}

impl ActionResult {
    pub fn success(message: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            status: ActionStatus::Success,
            message: message.into(),
            details: None,
            duration_seconds,
        }
    }

    pub fn failed(message: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            status: ActionStatus::Failed,
            message: message.into(),
            details: None,
            duration_seconds,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }

    /// The `ClusterEvent` severity this result implies, per the Event
    /// Emitter's status-to-severity mapping.
    pub fn event_type(&self) -> crate::event::EventType {
        match self.status {
            ActionStatus::Success => crate::event::EventType::Normal,
            ActionStatus::Failed | ActionStatus::Timeout | ActionStatus::Skipped => {
                crate::event::EventType::Warning
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_result_maps_to_normal_event() {
        let r = ActionResult::success("scaled", 0.2);
        assert!(r.is_success());
        assert_eq!(r.event_type(), crate::event::EventType::Normal);
    }

    #[test]
    fn failed_result_maps_to_warning_event() {
        let r = ActionResult::failed("boom", 0.1);
        assert!(!r.is_success());
        assert_eq!(r.event_type(), crate::event::EventType::Warning);
    }
}
