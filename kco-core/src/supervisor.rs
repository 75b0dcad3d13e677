//! One Supervisor per `TargetApp`: polls its state endpoint, evaluates
//! trigger bindings against the resulting state change, and dispatches
//! matching bindings to the action registry.

use crate::actions::ActionRegistry;
use crate::cluster::ClusterClient;
use crate::events::EventEmitter;
use crate::state_store::StateStore;
use kco_actors::actor::Addr;
use kco_actors::rate::{RateLimiter, RateMsg, TenantKey};
use kco_common::action::ActionContext;
use kco_common::config::TAppConfig;
use kco_common::event::{TargetAppState, TargetAppStatus};
use kco_common::state::StateSnapshot;
use kco_http::query::{QueryClient, QueryError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Port assumed for a discovered pod when `endpoint` is a path rather than an
/// absolute URL. The reference operator hardcodes this rather than reading it
/// from the pod spec, since TApp targets are expected to serve their state
/// query on a conventional application port.
const DISCOVERED_POD_PORT: u16 = 8080;

pub struct Supervisor {
    tenant_key: String,
    config: TAppConfig,
    cluster: Arc<dyn ClusterClient>,
    state_store: Arc<StateStore>,
    event_emitter: Arc<EventEmitter>,
    rate_limiter: Addr<RateLimiter>,
    action_registry: Arc<ActionRegistry>,
    status: Arc<Mutex<TargetAppStatus>>,
    actions_executed: AtomicU64,
    events_generated: AtomicU64,
    /// Resolved once at start (and left alone across ticks), per the "pods
    /// are rediscovered only on (re)start" behavior documented on
    /// `kco_http::query::PodAddress`.
    resolved_base_url: Mutex<Option<String>>,
}

impl Supervisor {
    pub fn new(
        config: TAppConfig,
        cluster: Arc<dyn ClusterClient>,
        state_store: Arc<StateStore>,
        event_emitter: Arc<EventEmitter>,
        rate_limiter: Addr<RateLimiter>,
        action_registry: Arc<ActionRegistry>,
    ) -> Self {
        let tenant_key = config.tenant_key();
        Self {
            tenant_key,
            config,
            cluster,
            state_store,
            event_emitter,
            rate_limiter,
            action_registry,
            status: Arc::new(Mutex::new(TargetAppStatus::default())),
            actions_executed: AtomicU64::new(0),
            events_generated: AtomicU64::new(0),
            resolved_base_url: Mutex::new(None),
        }
    }

    pub fn status(&self) -> TargetAppStatus {
        self.status.lock().unwrap().clone()
    }

    fn set_state(&self, state: TargetAppState) {
        self.status.lock().unwrap().state = state;
    }

    /// Run until `shutdown` fires. Uses a cancellable-sleep-or-stop race
    /// rather than `kco_actors::supervise`'s restart-on-error loop: a poll
    /// failure here is handled per-step (logged, surfaced as a status field)
    /// and the loop continues on the same schedule, it never restarts the
    /// whole Supervisor from scratch.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        self.set_state(TargetAppState::Running);
        let interval = Duration::from_secs(self.config.polling_interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    self.set_state(TargetAppState::Stopping);
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    self.tick().await;
                }
            }
        }
        self.set_state(TargetAppState::Stopped);
    }

    async fn tick(&self) {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        let acquired = self
            .rate_limiter
            .send(RateMsg::Acquire {
                tenant: TenantKey(self.tenant_key.clone()),
                cost: 1.0,
                timeout: Duration::from_secs(self.config.request_timeout),
                reply: reply_tx,
            })
            .await
            .is_ok()
            && reply_rx.await.unwrap_or(false);

        if !acquired {
            tracing::warn!(tenant_key = %self.tenant_key, "rate limit exhausted, skipping poll");
            return;
        }

        let base_url = match self.base_url().await {
            Ok(url) => url,
            Err(err) => {
                self.record_error(err.to_string());
                return;
            }
        };

        let client = match QueryClient::new(&base_url)
            .map(|c| c.with_timeout(Duration::from_secs(self.config.request_timeout)))
        {
            Ok(c) => c,
            Err(err) => {
                self.record_error(err.to_string());
                return;
            }
        };

        match client.query_state(&self.config.query).await {
            Ok(data) => self.on_state(data).await,
            Err(err) => self.record_error(err.to_string()),
        }
    }

    /// Returns the absolute URL to poll, resolving and caching a pod address
    /// the first time `endpoint` turns out to be a bare path.
    async fn base_url(&self) -> Result<String, QueryError> {
        if let Some(cached) = self.resolved_base_url.lock().unwrap().clone() {
            return Ok(cached);
        }

        let resolved = if self.config.endpoint.starts_with("http://")
            || self.config.endpoint.starts_with("https://")
        {
            self.config.endpoint.clone()
        } else {
            let pods = self
                .cluster
                .get_pods_by_selector(&self.config.namespace, &self.config.selector)
                .await
                .map_err(|e| QueryError::Discovery(e.to_string()))?;
            let pod = pods
                .iter()
                .find(|p| p.ready && p.ip.is_some())
                .ok_or_else(|| QueryError::Discovery(format!("no ready pod with an IP for {}", self.tenant_key)))?;
            format!(
                "http://{}:{}{}",
                pod.ip.as_deref().unwrap(),
                DISCOVERED_POD_PORT,
                self.config.endpoint
            )
        };

        *self.resolved_base_url.lock().unwrap() = Some(resolved.clone());
        Ok(resolved)
    }

    fn record_error(&self, message: String) {
        tracing::warn!(tenant_key = %self.tenant_key, error = %message, "state query failed");
        self.status.lock().unwrap().last_error = Some(message);
    }

    async fn on_state(&self, data: serde_json::Value) {
        let snapshot = StateSnapshot::new(chrono::Utc::now(), data);
        let change = self.state_store.record(&self.tenant_key, snapshot);
        {
            let mut status = self.status.lock().unwrap();
            status.last_polled = Some(chrono::Utc::now());
            status.last_error = None;
        }

        if let Some(event) = self.event_emitter.for_state_change(&change, "TargetApp") {
            if self.cluster.create_event(event).await.is_ok() {
                self.events_generated.fetch_add(1, Ordering::Relaxed);
                self.status.lock().unwrap().events_generated = self.events_generated.load(Ordering::Relaxed);
            }
        }

        if change.is_initial() {
            return;
        }

        for binding in &self.config.actions {
            if !crate::actions::evaluate(&binding.trigger, &change.new_snapshot.data) {
                continue;
            }
            let Some(effector) = self.action_registry.get(&binding.action_name) else {
                tracing::warn!(action = %binding.action_name, tenant_key = %self.tenant_key, "no effector registered for action");
                continue;
            };
            let ctx = ActionContext {
                state_change: change.clone(),
                action_name: binding.action_name.clone(),
                parameters: binding.parameters.clone(),
                tapp_config: self.config.clone(),
            };
            let result = effector.execute(&ctx).await;
            self.actions_executed.fetch_add(1, Ordering::Relaxed);
            self.status.lock().unwrap().actions_executed = self.actions_executed.load(Ordering::Relaxed);

            if let Some(event) =
                self.event_emitter
                    .for_action_result(&self.tenant_key, &binding.action_name, &result, "TargetApp")
            {
                if self.cluster.create_event(event).await.is_ok() {
                    self.events_generated.fetch_add(1, Ordering::Relaxed);
                    self.status.lock().unwrap().events_generated = self.events_generated.load(Ordering::Relaxed);
                }
            }
        }
    }
}
