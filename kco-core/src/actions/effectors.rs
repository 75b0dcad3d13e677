//! The five built-in effectors. Four operate on the cluster through
//! [`ClusterClient`]; `webhook` talks to an external URL over plain HTTP,
//! since it isn't a Kubernetes API operation.

use super::{ActionRegistry, Effector};
use crate::cluster::ClusterClient;
use async_trait::async_trait;
use kco_common::action::{ActionContext, ActionResult};
use std::sync::Arc;
use std::time::Instant;

pub fn register_builtin_effectors(cluster: Arc<dyn ClusterClient>) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(RestartPod { cluster: cluster.clone() }));
    registry.register(Arc::new(ScaleDeployment { cluster: cluster.clone() }));
    registry.register(Arc::new(PatchResource { cluster: cluster.clone() }));
    registry.register(Arc::new(ExecCommand { cluster }));
    registry.register(Arc::new(Webhook::default()));
    registry
}

struct RestartPod {
    cluster: Arc<dyn ClusterClient>,
}

#[async_trait]
impl Effector for RestartPod {
    fn name(&self) -> &str {
        "restart_pod"
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionResult {
        let start = Instant::now();
        let pods = match self
            .cluster
            .get_pods_by_selector(&ctx.tapp_config.namespace, &ctx.tapp_config.selector)
            .await
        {
            Ok(pods) => pods,
            Err(err) => return ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        };
        let Some(pod) = pods.first() else {
            return ActionResult::failed("no matching pod to restart", start.elapsed().as_secs_f64());
        };
        match self.cluster.restart_pod(&ctx.tapp_config.namespace, &pod.name).await {
            Ok(()) => ActionResult::success(format!("restarted pod {}", pod.name), start.elapsed().as_secs_f64()),
            Err(err) => ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        }
    }
}

struct ScaleDeployment {
    cluster: Arc<dyn ClusterClient>,
}

#[async_trait]
impl Effector for ScaleDeployment {
    fn name(&self) -> &str {
        "scale_deployment"
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionResult {
        let start = Instant::now();
        let name = ctx
            .parameters
            .get("deployment_name")
            .and_then(|v| v.as_str())
            .unwrap_or(ctx.tapp_config.name.as_str());
        let Some(replicas) = ctx.parameters.get("replicas").and_then(|v| v.as_i64()) else {
            return ActionResult::failed("scale_deployment requires a `replicas` parameter", start.elapsed().as_secs_f64());
        };
        match self
            .cluster
            .scale_deployment(&ctx.tapp_config.namespace, name, replicas as i32)
            .await
        {
            Ok(()) => ActionResult::success(
                format!("scaled {name} to {replicas} replicas"),
                start.elapsed().as_secs_f64(),
            ),
            Err(err) => ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        }
    }
}

struct PatchResource {
    cluster: Arc<dyn ClusterClient>,
}

#[async_trait]
impl Effector for PatchResource {
    fn name(&self) -> &str {
        "patch_resource"
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionResult {
        let start = Instant::now();
        let kind = ctx.parameters.get("kind").and_then(|v| v.as_str()).unwrap_or("Deployment");
        let name = ctx
            .parameters
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(ctx.tapp_config.name.as_str());
        let Some(patch) = ctx.parameters.get("patch").cloned() else {
            return ActionResult::failed("patch_resource requires a `patch` parameter", start.elapsed().as_secs_f64());
        };
        match self
            .cluster
            .patch_resource(&ctx.tapp_config.namespace, kind, name, patch)
            .await
        {
            Ok(()) => ActionResult::success(format!("patched {kind}/{name}"), start.elapsed().as_secs_f64()),
            Err(err) => ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        }
    }
}

struct ExecCommand {
    cluster: Arc<dyn ClusterClient>,
}

#[async_trait]
impl Effector for ExecCommand {
    fn name(&self) -> &str {
        "exec_command"
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionResult {
        let start = Instant::now();
        let Some(command) = ctx.parameters.get("command").and_then(|v| v.as_array()) else {
            return ActionResult::failed("exec_command requires a `command` array parameter", start.elapsed().as_secs_f64());
        };
        let command: Vec<String> = command
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        let pods = match self
            .cluster
            .get_pods_by_selector(&ctx.tapp_config.namespace, &ctx.tapp_config.selector)
            .await
        {
            Ok(pods) => pods,
            Err(err) => return ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        };
        let Some(pod) = pods.first() else {
            return ActionResult::failed("no matching pod to exec in", start.elapsed().as_secs_f64());
        };
        match self
            .cluster
            .exec_in_pod(&ctx.tapp_config.namespace, &pod.name, &command)
            .await
        {
            Ok(outcome) if outcome.succeeded() => ActionResult::success(
                format!("exec in {} exited 0: {}", pod.name, outcome.stdout.trim()),
                start.elapsed().as_secs_f64(),
            ),
            Ok(outcome) => ActionResult::failed(
                format!("exec in {} exited {}: {}", pod.name, outcome.exit_code, outcome.stderr.trim()),
                start.elapsed().as_secs_f64(),
            ),
            Err(err) => ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        }
    }
}

/// Posts the action's `payload` parameter to an external `url` parameter.
/// Placeholders of the form `{{field}}` inside the serialized JSON payload
/// are substituted with the dotted field's value from the triggering state
/// change, via a naive post-serialization string replace — matching the
/// reference implementation's templating rather than a structured templater.
#[derive(Default)]
struct Webhook;

#[async_trait]
impl Effector for Webhook {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn execute(&self, ctx: &ActionContext) -> ActionResult {
        let start = Instant::now();
        let Some(url) = ctx.parameters.get("url").and_then(|v| v.as_str()) else {
            return ActionResult::failed("webhook requires a `url` parameter", start.elapsed().as_secs_f64());
        };
        let payload = ctx.parameters.get("payload").cloned().unwrap_or_default();
        let rendered = render_placeholders(&payload, &ctx.state_change.new_snapshot.data);

        let client = match kco_http::HttpClient::new(url) {
            Ok(c) => c,
            Err(err) => return ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        };
        let opts = kco_http::RequestOpts {
            allow_absolute: true,
            ..Default::default()
        };
        let result: Result<serde_json::Value, _> = client.post_json_opts(url, &rendered, opts).await;
        match result {
            Ok(_) => ActionResult::success(format!("posted webhook to {url}"), start.elapsed().as_secs_f64()),
            Err(err) => ActionResult::failed(err.to_string(), start.elapsed().as_secs_f64()),
        }
    }
}

fn render_placeholders(payload: &serde_json::Value, observed: &serde_json::Value) -> serde_json::Value {
    let Ok(mut rendered) = serde_json::to_string(payload) else {
        return payload.clone();
    };
    if let serde_json::Value::Object(map) = observed {
        for (key, value) in map {
            let placeholder = format!("{{{{{key}}}}}");
            if rendered.contains(&placeholder) {
                let replacement = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                rendered = rendered.replace(&placeholder, &replacement);
            }
        }
    }
    serde_json::from_str(&rendered).unwrap_or_else(|_| payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholder_substitution_is_string_level() {
        let payload = json!({"message": "phase is {{phase}}"});
        let observed = json!({"phase": "Failed"});
        let rendered = render_placeholders(&payload, &observed);
        assert_eq!(rendered["message"], "phase is Failed");
    }

    #[test]
    fn missing_placeholder_is_left_untouched() {
        let payload = json!({"message": "phase is {{phase}}"});
        let observed = json!({"other": 1});
        let rendered = render_placeholders(&payload, &observed);
        assert_eq!(rendered["message"], "phase is {{phase}}");
    }
}
