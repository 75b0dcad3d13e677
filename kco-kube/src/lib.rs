//! Real cluster bindings: the `TargetApp` CRD type, the watch stream that
//! feeds `Controller::run_watch`, and the `kube`-backed `ClusterClient`.

pub mod client;
pub mod resource;
pub mod watcher;

pub use client::KubeClusterClient;
pub use resource::{TargetApp, TargetAppResourceStatus, TargetAppSpec};
pub use watcher::watch_target_apps;
