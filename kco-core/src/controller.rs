//! Owns the map of running Supervisors and reacts to `TargetAppEvent`s from
//! the cluster watch.

use crate::actions::{register_builtin_effectors, ActionRegistry};
use crate::cluster::ClusterClient;
use crate::events::EventEmitter;
use crate::state_store::StateStore;
use crate::supervisor::Supervisor;
use futures::Stream;
use futures::StreamExt;
use kco_actors::actor::{spawn_actor, ActorHandle};
use kco_actors::rate::RateLimiter;
use kco_common::config::TAppConfig;
use kco_common::event::TargetAppEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

struct RunningTapp {
    supervisor: Arc<Supervisor>,
    shutdown_tx: broadcast::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

/// Top-level singleton: the map of running Supervisors is the only
/// process-wide mutable state besides the action registry and the metrics
/// registry, per the specified single-process ownership model.
pub struct Controller {
    cluster: Arc<dyn ClusterClient>,
    state_store: Arc<StateStore>,
    event_emitter: Arc<EventEmitter>,
    action_registry: Arc<ActionRegistry>,
    rate_limiter: ActorHandle<RateLimiter>,
    tapps: Mutex<HashMap<String, RunningTapp>>,
}

impl Controller {
    pub fn new(cluster: Arc<dyn ClusterClient>, default_rpm: u32, dedup_window: Duration) -> Self {
        let action_registry = Arc::new(register_builtin_effectors(cluster.clone()));
        let rate_limiter = spawn_actor(RateLimiter::new(default_rpm), 64);
        Self {
            cluster,
            state_store: Arc::new(StateStore::new()),
            event_emitter: Arc::new(EventEmitter::new(dedup_window)),
            action_registry,
            rate_limiter,
            tapps: Mutex::new(HashMap::new()),
        }
    }

    pub async fn start_monitoring(&self, config: TAppConfig) {
        let tenant_key = config.tenant_key();
        if let Err(err) = config.validate() {
            tracing::warn!(tenant_key = %tenant_key, error = %err, "rejecting invalid TargetApp spec");
            return;
        }

        let mut guard = self.tapps.lock().await;
        if let Some(existing) = guard.remove(&tenant_key) {
            let _ = existing.shutdown_tx.send(());
            existing.task.abort();
        }

        let supervisor = Arc::new(Supervisor::new(
            config,
            self.cluster.clone(),
            self.state_store.clone(),
            self.event_emitter.clone(),
            self.rate_limiter.addr.clone(),
            self.action_registry.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task_supervisor = supervisor.clone();
        let task = tokio::spawn(async move {
            task_supervisor.run(shutdown_rx).await;
        });

        tracing::info!(tenant_key = %tenant_key, "started monitoring");
        guard.insert(
            tenant_key,
            RunningTapp {
                supervisor,
                shutdown_tx,
                task,
            },
        );
    }

    pub async fn stop_monitoring(&self, tenant_key: &str) {
        let mut guard = self.tapps.lock().await;
        if let Some(running) = guard.remove(tenant_key) {
            let _ = running.shutdown_tx.send(());
            let _ = running.task.await;
            tracing::info!(tenant_key = %tenant_key, "stopped monitoring");
        }
        self.state_store.remove(tenant_key);
    }

    /// Drain a stream of `TargetAppEvent`s, starting or stopping Supervisors
    /// as TApp resources are applied or deleted. Runs until the stream ends
    /// or the caller drops it (the caller owns cancellation via the stream).
    pub async fn run_watch(self: Arc<Self>, mut events: impl Stream<Item = TargetAppEvent> + Unpin) {
        while let Some(event) = events.next().await {
            match event {
                TargetAppEvent::Applied { namespace, name, spec } => {
                    match parse_tapp_config(&namespace, &name, spec) {
                        Ok(config) => self.start_monitoring(config).await,
                        Err(err) => {
                            tracing::warn!(namespace = %namespace, name = %name, error = %err, "failed to parse TargetApp spec");
                        }
                    }
                }
                TargetAppEvent::Deleted { namespace, name } => {
                    self.stop_monitoring(&format!("{namespace}/{name}")).await;
                }
            }
        }
    }

    /// Periodically sweep idle rate-limiter buckets and stale dedup cache
    /// entries; spawned once at startup and run for the process lifetime.
    pub async fn run_cleanup(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(interval) => {
                    self.event_emitter.cleanup(std::time::Instant::now());
                    let (tx, rx) = tokio::sync::oneshot::channel();
                    let _ = self.rate_limiter.addr.send(kco_actors::rate::RateMsg::Cleanup {
                        max_idle: interval * 10,
                        reply: tx,
                    }).await;
                    let _ = rx.await;
                }
            }
        }
    }

    pub async fn stats(&self) -> ControllerStats {
        let guard = self.tapps.lock().await;
        ControllerStats {
            tapp_count: guard.len(),
            tenant_keys: guard.keys().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerStats {
    pub tapp_count: usize,
    pub tenant_keys: Vec<String>,
}

fn parse_tapp_config(
    namespace: &str,
    name: &str,
    spec: serde_json::Value,
) -> Result<TAppConfig, serde_json::Error> {
    let mut spec = spec;
    if let serde_json::Value::Object(ref mut map) = spec {
        map.entry("namespace").or_insert_with(|| namespace.into());
        map.entry("name").or_insert_with(|| name.into());
    }
    serde_json::from_value(spec)
}
