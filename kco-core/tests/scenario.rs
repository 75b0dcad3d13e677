//! End-to-end scenarios exercising the state store, event emitter, and
//! action registry together, the way a Supervisor wires them after each
//! successful poll — without going over the network for the poll itself.

use kco_core::cluster::fake::{FakeClusterClient, RecordedCall};
use kco_core::cluster::ClusterClient;
use kco_core::{evaluate, ActionRegistry, EventEmitter, StateStore};
use kco_common::action::ActionContext;
use kco_common::config::{ActionBinding, Condition, TAppConfig, TriggerSpec};
use kco_common::state::StateSnapshot;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn tapp_config(actions: Vec<ActionBinding>) -> TAppConfig {
    let mut selector = BTreeMap::new();
    selector.insert("app".to_string(), "checkout".to_string());
    TAppConfig {
        namespace: "default".to_string(),
        name: "checkout".to_string(),
        selector,
        endpoint: "/graphql".to_string(),
        polling_interval: 30,
        query: "{ status }".to_string(),
        actions,
        request_timeout: 10,
        max_retries: 3,
    }
}

#[tokio::test]
async fn state_change_fires_bound_action_and_emits_events() {
    let fake = Arc::new(FakeClusterClient::new().with_pod(kco_core::PodInfo {
        name: "checkout-0".to_string(),
        namespace: "default".to_string(),
        ip: Some("10.0.0.1".to_string()),
        ready: true,
    }));
    let cluster: Arc<dyn ClusterClient> = fake.clone();
    let registry = Arc::new(kco_core::actions::register_builtin_effectors(cluster.clone()));
    let store = StateStore::new();
    let emitter = EventEmitter::new(Duration::from_secs(300));

    let config = tapp_config(vec![ActionBinding {
        trigger: TriggerSpec {
            field: "status.phase".to_string(),
            condition: "equals".to_string(),
            value: Some(json!("Failed")),
        },
        action_name: "restart_pod".to_string(),
        parameters: json!({}),
    }]);

    // First observation: initial snapshot, no trigger evaluation.
    let initial = store.record(&config.tenant_key(), StateSnapshot::new(chrono::Utc::now(), json!({"status": {"phase": "Running"}})));
    assert!(initial.is_initial());
    assert!(emitter.for_state_change(&initial, "TargetApp").is_none());

    // Second observation flips to Failed: trigger fires, restart_pod runs.
    let changed = store.record(&config.tenant_key(), StateSnapshot::new(chrono::Utc::now(), json!({"status": {"phase": "Failed"}})));
    assert!(!changed.is_initial());
    assert!(changed.changed_paths.contains("status.phase"));

    let state_event = emitter.for_state_change(&changed, "TargetApp");
    assert!(state_event.is_some());

    for binding in &config.actions {
        assert!(evaluate(&binding.trigger, &changed.new_snapshot.data));
        let effector = registry.get(&binding.action_name).unwrap();
        let ctx = ActionContext {
            state_change: changed.clone(),
            action_name: binding.action_name.clone(),
            parameters: binding.parameters.clone(),
            tapp_config: config.clone(),
        };
        let result = effector.execute(&ctx).await;
        assert!(result.is_success());
        let action_event = emitter.for_action_result(&config.tenant_key(), &binding.action_name, &result, "TargetApp");
        assert!(action_event.is_some());
    }

    let calls = fake.calls();
    assert!(calls.iter().any(|c| matches!(c, RecordedCall::RestartPod { .. })));
}

#[tokio::test]
async fn repeated_identical_state_change_is_deduplicated() {
    let emitter = EventEmitter::new(Duration::from_secs(300));
    let store = StateStore::new();
    let tenant_key = "default/checkout";

    store.record(tenant_key, StateSnapshot::new(chrono::Utc::now(), json!({"a": 1})));
    let change_a = store.record(tenant_key, StateSnapshot::new(chrono::Utc::now(), json!({"a": 2})));
    let first = emitter.for_state_change(&change_a, "TargetApp");
    assert!(first.is_some());

    store.record(tenant_key, StateSnapshot::new(chrono::Utc::now(), json!({"a": 1})));
    let change_b = store.record(tenant_key, StateSnapshot::new(chrono::Utc::now(), json!({"a": 2})));
    let second = emitter.for_state_change(&change_b, "TargetApp");
    assert!(second.is_none(), "identical changed-path set within the window should be suppressed");
}

#[tokio::test]
async fn unknown_action_name_is_skipped_without_panicking() {
    let registry: Arc<ActionRegistry> = Arc::new(ActionRegistry::new());
    assert!(registry.get("does_not_exist").is_none());
}
