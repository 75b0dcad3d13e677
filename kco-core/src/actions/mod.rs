//! The action registry: a named, pluggable set of [`Effector`]s a Supervisor
//! dispatches to when a trigger fires.

mod effectors;

pub use effectors::register_builtin_effectors;

use async_trait::async_trait;
use kco_common::action::{ActionContext, ActionResult};
use kco_common::config::{Condition, TriggerSpec};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Evaluates one trigger against the new side of a state change. Shared by
/// every `Effector::can_handle` default implementation so condition
/// semantics live in exactly one place.
///
/// An unrecognized `condition` string logs a warning and evaluates to
/// `false` rather than erroring the whole reconciliation, matching the
/// reference operator's defensive trigger evaluation.
pub fn evaluate(trigger: &TriggerSpec, observed: &Value) -> bool {
    let field_value = lookup_path(observed, &trigger.field);
    let Some(condition) = Condition::parse(&trigger.condition) else {
        tracing::warn!(condition = %trigger.condition, field = %trigger.field, "unknown trigger condition, treating as false");
        return false;
    };
    match condition {
        Condition::Exists => field_value.is_some(),
        Condition::NotExists => field_value.is_none(),
        Condition::Equals => field_value.map(|v| values_equal(v, trigger.value.as_ref())).unwrap_or(false),
        Condition::NotEquals => field_value.map(|v| !values_equal(v, trigger.value.as_ref())).unwrap_or(true),
        Condition::GreaterThan => compare_numeric(field_value, trigger.value.as_ref(), |a, b| a > b),
        Condition::LessThan => compare_numeric(field_value, trigger.value.as_ref(), |a, b| a < b),
        Condition::Contains => match (field_value, &trigger.value) {
            (Some(v), Some(needle)) => stringify(v).contains(&stringify(needle)),
            _ => false,
        },
    }
}

fn values_equal(a: &Value, b: Option<&Value>) -> bool {
    match b {
        Some(b) => a == b,
        None => false,
    }
}

fn compare_numeric(a: Option<&Value>, b: Option<&Value>, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (a.and_then(Value::as_f64), b.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// `contains` stringifies both operands before comparing, matching the
/// reference implementation's `str(haystack).find(str(needle))` behavior
/// rather than requiring both sides to already be strings.
fn stringify(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup_path<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut cur = value;
    for segment in dotted.split('.') {
        cur = cur.get(segment)?;
    }
    Some(cur)
}

/// One pluggable action a TApp can bind a trigger to.
#[async_trait]
pub trait Effector: Send + Sync {
    fn name(&self) -> &str;

    /// Default trigger evaluation, delegated to the free [`evaluate`]
    /// function; override only if an effector needs bespoke semantics.
    fn can_handle(&self, trigger: &TriggerSpec, observed: &Value) -> bool {
        evaluate(trigger, observed)
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionResult;
}

/// Name-keyed collection of effectors, built once at Controller startup.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    effectors: HashMap<String, Arc<dyn Effector>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, effector: Arc<dyn Effector>) {
        self.effectors.insert(effector.name().to_string(), effector);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Effector>> {
        self.effectors.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.effectors.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trigger(field: &str, condition: &str, value: Option<Value>) -> TriggerSpec {
        TriggerSpec {
            field: field.to_string(),
            condition: condition.to_string(),
            value,
        }
    }

    #[test]
    fn equals_matches_scalar_field() {
        let observed = json!({"status": {"phase": "Failed"}});
        let t = trigger("status.phase", "equals", Some(json!("Failed")));
        assert!(evaluate(&t, &observed));
    }

    #[test]
    fn exists_true_when_field_present() {
        let observed = json!({"status": {"phase": "Failed"}});
        let t = trigger("status.phase", "exists", None);
        assert!(evaluate(&t, &observed));
        let t2 = trigger("status.missing", "exists", None);
        assert!(!evaluate(&t2, &observed));
    }

    #[test]
    fn contains_stringifies_both_sides() {
        let observed = json!({"count": 12345});
        let t = trigger("count", "contains", Some(json!("234")));
        assert!(evaluate(&t, &observed));
    }

    #[test]
    fn greater_than_requires_numeric_operands() {
        let observed = json!({"replicas": 5});
        let t = trigger("replicas", "greater_than", Some(json!(3)));
        assert!(evaluate(&t, &observed));
        let t2 = trigger("replicas", "greater_than", Some(json!("three")));
        assert!(!evaluate(&t2, &observed));
    }

    #[test]
    fn unknown_condition_is_false() {
        let observed = json!({"a": 1});
        let t = trigger("a", "matches_regex", Some(json!("1")));
        assert!(!evaluate(&t, &observed));
    }
}
