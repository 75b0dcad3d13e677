//! Real `ClusterClient`, backed by `kube` + `k8s-openapi`.

use async_trait::async_trait;
use futures::{AsyncReadExt, TryStreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event as CoreEvent, EventSource, ObjectReference, Pod};
use kco_common::event::EventType;
use kco_core::cluster::{ClusterClient, ClusterError, ExecOutcome, PodInfo};
use kube::api::{AttachParams, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;

pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn label_selector(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_pods_by_selector(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(&label_selector(selector));
        let pods = api.list(&lp).await.map_err(|e| ClusterError::Api(e.to_string()))?;

        let infos: Vec<PodInfo> = pods
            .items
            .into_iter()
            .filter_map(|pod| {
                let name = pod.metadata.name?;
                let ready = pod
                    .status
                    .as_ref()
                    .and_then(|s| s.conditions.as_ref())
                    .map(|conds| {
                        conds
                            .iter()
                            .any(|c| c.type_ == "Ready" && c.status == "True")
                    })
                    .unwrap_or(false);
                let ip = pod.status.as_ref().and_then(|s| s.pod_ip.clone());
                Some(PodInfo {
                    name,
                    namespace: namespace.to_string(),
                    ip,
                    ready,
                })
            })
            .collect();

        if infos.is_empty() {
            return Err(ClusterError::NoMatchingPod {
                namespace: namespace.to_string(),
                selector: selector.clone(),
            });
        }
        Ok(infos)
    }

    async fn create_event(&self, event: kco_common::ClusterEvent) -> Result<(), ClusterError> {
        let api: Api<CoreEvent> = Api::namespaced(self.client.clone(), &event.involved_object_namespace);
        let k8s_event = CoreEvent {
            metadata: kube::api::ObjectMeta {
                generate_name: Some(event.generate_name.clone()),
                namespace: Some(event.involved_object_namespace.clone()),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: Some(event.involved_object_kind.clone()),
                name: Some(event.involved_object_name.clone()),
                namespace: Some(event.involved_object_namespace.clone()),
                ..Default::default()
            },
            reason: Some(event.reason.clone()),
            message: Some(event.message.clone()),
            type_: Some(match event.type_ {
                EventType::Normal => "Normal".to_string(),
                EventType::Warning => "Warning".to_string(),
            }),
            source: Some(EventSource {
                component: Some(event.source_component.clone()),
                ..Default::default()
            }),
            count: Some(event.count as i32),
            first_timestamp: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(event.first_timestamp)),
            last_timestamp: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(event.last_timestamp)),
            ..Default::default()
        };

        api.create(&PostParams::default(), &k8s_event)
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::Api(e.to_string()))
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::Api(e.to_string()))
    }

    async fn restart_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| match e {
                kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    kind: "Pod".to_string(),
                },
                other => ClusterError::Api(other.to_string()),
            })
    }

    async fn patch_resource(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<(), ClusterError> {
        let params = PatchParams::default();
        match kind {
            "Deployment" => {
                let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
                api.patch(name, &params, &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
                    .map_err(|e| ClusterError::Api(e.to_string()))
            }
            "Pod" => {
                let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
                api.patch(name, &params, &Patch::Merge(&patch))
                    .await
                    .map(|_| ())
                    .map_err(|e| ClusterError::Api(e.to_string()))
            }
            other => Err(ClusterError::Api(format!("unsupported patch_resource kind: {other}"))),
        }
    }

    async fn exec_in_pod(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
    ) -> Result<ExecOutcome, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let mut attached = api
            .exec(
                pod,
                command.to_vec(),
                &AttachParams::default().stdout(true).stderr(true),
            )
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;

        let mut stdout = String::new();
        if let Some(mut out) = attached.stdout() {
            let _ = out.read_to_string(&mut stdout).await;
        }
        let mut stderr = String::new();
        if let Some(mut err) = attached.stderr() {
            let _ = err.read_to_string(&mut stderr).await;
        }

        let status = attached.take_status().and_then(|mut s| {
            futures::executor::block_on(async { s.try_next().await.ok().flatten() })
        });
        let exit_code = status
            .and_then(|s| s.status)
            .map(|s| if s == "Success" { 0 } else { 1 })
            .unwrap_or(0);

        Ok(ExecOutcome { stdout, stderr, exit_code })
    }
}
