//! The narrow slice of the Kubernetes API surface a Supervisor or Effector
//! ever touches, reified as a trait so tests run against an in-memory fake
//! instead of a real API server.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("no pod matches selector in namespace {namespace}: {selector:?}")]
    NoMatchingPod {
        namespace: String,
        selector: BTreeMap<String, String>,
    },
    #[error("resource not found: {namespace}/{name} ({kind})")]
    NotFound {
        namespace: String,
        name: String,
        kind: String,
    },
    #[error("cluster API error: {0}")]
    Api(String),
}

#[derive(Debug, Clone)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub ip: Option<String>,
    pub ready: bool,
}

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Abstraction over the handful of cluster operations the Supervisor and the
/// built-in Effectors need. `kco-kube` provides the real implementation
/// backed by `kube`/`k8s-openapi`; `FakeClusterClient` backs unit and
/// integration tests.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get_pods_by_selector(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodInfo>, ClusterError>;

    async fn create_event(&self, event: kco_common::ClusterEvent) -> Result<(), ClusterError>;

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError>;

    async fn restart_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn patch_resource(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<(), ClusterError>;

    async fn exec_in_pod(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
    ) -> Result<ExecOutcome, ClusterError>;
}

/// In-memory `ClusterClient` used by tests. Every mutating call is recorded
/// so assertions can inspect what the Controller attempted without a real
/// apiserver.
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum RecordedCall {
        CreateEvent(kco_common::ClusterEvent),
        ScaleDeployment { namespace: String, name: String, replicas: i32 },
        RestartPod { namespace: String, name: String },
        PatchResource { namespace: String, kind: String, name: String, patch: serde_json::Value },
        Exec { namespace: String, pod: String, command: Vec<String> },
    }

    pub struct FakeClusterClient {
        pods: Mutex<Vec<PodInfo>>,
        calls: Mutex<Vec<RecordedCall>>,
        exec_result: Mutex<Option<ExecOutcome>>,
    }

    impl Default for FakeClusterClient {
        fn default() -> Self {
            Self {
                pods: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                exec_result: Mutex::new(None),
            }
        }
    }

    impl FakeClusterClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_pod(self, pod: PodInfo) -> Self {
            self.pods.lock().unwrap().push(pod);
            self
        }

        pub fn set_exec_result(&self, outcome: ExecOutcome) {
            *self.exec_result.lock().unwrap() = Some(outcome);
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClusterClient for FakeClusterClient {
        async fn get_pods_by_selector(
            &self,
            namespace: &str,
            selector: &BTreeMap<String, String>,
        ) -> Result<Vec<PodInfo>, ClusterError> {
            let matches: Vec<PodInfo> = self
                .pods
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.namespace == namespace)
                .cloned()
                .collect();
            if matches.is_empty() {
                return Err(ClusterError::NoMatchingPod {
                    namespace: namespace.to_string(),
                    selector: selector.clone(),
                });
            }
            Ok(matches)
        }

        async fn create_event(&self, event: kco_common::ClusterEvent) -> Result<(), ClusterError> {
            self.calls.lock().unwrap().push(RecordedCall::CreateEvent(event));
            Ok(())
        }

        async fn scale_deployment(
            &self,
            namespace: &str,
            name: &str,
            replicas: i32,
        ) -> Result<(), ClusterError> {
            self.calls.lock().unwrap().push(RecordedCall::ScaleDeployment {
                namespace: namespace.to_string(),
                name: name.to_string(),
                replicas,
            });
            Ok(())
        }

        async fn restart_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
            self.calls.lock().unwrap().push(RecordedCall::RestartPod {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
            Ok(())
        }

        async fn patch_resource(
            &self,
            namespace: &str,
            kind: &str,
            name: &str,
            patch: serde_json::Value,
        ) -> Result<(), ClusterError> {
            self.calls.lock().unwrap().push(RecordedCall::PatchResource {
                namespace: namespace.to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
                patch,
            });
            Ok(())
        }

        async fn exec_in_pod(
            &self,
            namespace: &str,
            pod: &str,
            command: &[String],
        ) -> Result<ExecOutcome, ClusterError> {
            self.calls.lock().unwrap().push(RecordedCall::Exec {
                namespace: namespace.to_string(),
                pod: pod.to_string(),
                command: command.to_vec(),
            });
            Ok(self.exec_result.lock().unwrap().clone().unwrap_or(ExecOutcome {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            }))
        }
    }
}

pub use fake::FakeClusterClient;
