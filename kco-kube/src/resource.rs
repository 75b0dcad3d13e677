//! The `TargetApp` custom resource definition: `operator.kco.local/v1alpha1`,
//! kind `TargetApp`, plural `targetapps`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "operator.kco.local",
    version = "v1alpha1",
    kind = "TargetApp",
    plural = "targetapps",
    namespaced,
    status = "TargetAppResourceStatus",
    shortname = "tapp"
)]
pub struct TargetAppSpec {
    pub selector: std::collections::BTreeMap<String, String>,
    #[serde(alias = "graphql_endpoint", default)]
    pub endpoint: Option<String>,
    #[serde(alias = "polling_interval", default)]
    pub polling_interval: Option<u64>,
    #[serde(alias = "state_query")]
    pub query: String,
    #[serde(default)]
    pub actions: Vec<serde_json::Value>,
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(alias = "max_retries", default)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct TargetAppResourceStatus {
    pub state: Option<String>,
    pub last_polled: Option<String>,
    pub last_error: Option<String>,
    pub actions_executed: Option<u64>,
    pub events_generated: Option<u64>,
}
