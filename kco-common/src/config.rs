//! The per-TApp configuration translated from a `TargetApp` custom resource's
//! `spec`, plus the trigger/action bindings it carries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed set of trigger conditions. An unrecognized condition string from
/// the wire format does not fail to deserialize — `TriggerSpec::condition`
/// is kept as a raw `String` so evaluation can log a warning and treat it as
/// false, per the specified "unknown condition -> warning + false" contract,
/// rather than rejecting the whole TApp at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    Exists,
    NotExists,
}

impl Condition {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "equals" => Condition::Equals,
            "not_equals" => Condition::NotEquals,
            "greater_than" => Condition::GreaterThan,
            "less_than" => Condition::LessThan,
            "contains" => Condition::Contains,
            "exists" => Condition::Exists,
            "not_exists" => Condition::NotExists,
            _ => return None,
        })
    }
}

/// `{field, condition, value}` — `value` is absent for `exists`/`not_exists`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub field: String,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// One `{trigger, action, parameters}` binding in a TApp's `actions` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionBinding {
    pub trigger: TriggerSpec,
    #[serde(rename = "action")]
    pub action_name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Immutable per-TApp spec consumed by a Supervisor.
///
/// `selector` identifies the target workload; `endpoint` is either an
/// absolute URL or a path resolved against a discovered pod. Accepts both
/// camelCase (wire format) and snake_case spec keys via `alias`, per the
/// custom resource's "the controller also accepts snake_case" contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TAppConfig {
    pub namespace: String,
    pub name: String,
    pub selector: BTreeMap<String, String>,
    #[serde(alias = "graphql_endpoint", default = "default_endpoint")]
    pub endpoint: String,
    #[serde(alias = "polling_interval", default = "default_polling_interval")]
    pub polling_interval: u64,
    #[serde(alias = "state_query")]
    pub query: String,
    #[serde(default)]
    pub actions: Vec<ActionBinding>,
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
    #[serde(alias = "max_retries", default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_endpoint() -> String {
    "/graphql".to_string()
}
fn default_polling_interval() -> u64 {
    30
}
fn default_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}

/// Reasons a `TAppConfig` fails validation; `startMonitoring` surfaces these
/// as a `Failed` status without creating a Supervisor.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("pollingInterval {0} out of range [5, 3600]")]
    PollingIntervalRange(u64),
    #[error("requestTimeout {0} out of range [1, 60]")]
    RequestTimeoutRange(u64),
    #[error("maxRetries {0} out of range [0, 10]")]
    MaxRetriesRange(u32),
    #[error("stateQuery must not be empty")]
    EmptyQuery,
}

impl TAppConfig {
    pub fn tenant_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !(5..=3600).contains(&self.polling_interval) {
            return Err(ConfigValidationError::PollingIntervalRange(
                self.polling_interval,
            ));
        }
        if !(1..=60).contains(&self.request_timeout) {
            return Err(ConfigValidationError::RequestTimeoutRange(
                self.request_timeout,
            ));
        }
        if self.max_retries > 10 {
            return Err(ConfigValidationError::MaxRetriesRange(self.max_retries));
        }
        if self.query.trim().is_empty() {
            return Err(ConfigValidationError::EmptyQuery);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_snake_case_and_camel_case_keys() {
        let camel: TAppConfig = serde_json::from_value(serde_json::json!({
            "namespace": "ns", "name": "x", "selector": {"app": "x"},
            "graphqlEndpoint": "/q", "pollingInterval": 15,
            "stateQuery": "q", "maxRetries": 5
        }))
        .unwrap();
        assert_eq!(camel.endpoint, "/q");
        assert_eq!(camel.polling_interval, 15);
        assert_eq!(camel.max_retries, 5);

        let snake: TAppConfig = serde_json::from_value(serde_json::json!({
            "namespace": "ns", "name": "x", "selector": {"app": "x"},
            "graphql_endpoint": "/q", "polling_interval": 15,
            "state_query": "q", "max_retries": 5
        }))
        .unwrap();
        assert_eq!(snake.endpoint, "/q");
        assert_eq!(snake.polling_interval, 15);
    }

    #[test]
    fn rejects_out_of_range_polling_interval() {
        let cfg = TAppConfig {
            namespace: "ns".into(),
            name: "x".into(),
            selector: BTreeMap::new(),
            endpoint: "/q".into(),
            polling_interval: 1,
            query: "q".into(),
            actions: vec![],
            request_timeout: 10,
            max_retries: 3,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::PollingIntervalRange(1))
        ));
    }

    #[test]
    fn unknown_condition_parses_as_none() {
        assert!(Condition::parse("matches_regex").is_none());
        assert_eq!(Condition::parse("equals"), Some(Condition::Equals));
    }
}
