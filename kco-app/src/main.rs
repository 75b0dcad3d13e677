use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use kco_common::observability::{init_logging, LogConfig, LogFormat};
use kco_config::SettingsLoader;
use kco_core::Controller;
use kco_kube::{watch_target_apps, KubeClusterClient};
use kco_runtime::KcoRuntime;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(name = "kco", about = "Kubernetes operator that monitors TargetApp resources")]
struct Cli {
    /// Override the namespace to watch; defaults to KCO_WATCH_NAMESPACE / all namespaces.
    #[arg(long)]
    namespace: Option<String>,
}

#[derive(Clone)]
struct AppState {
    controller: Arc<Controller>,
    ready: Arc<std::sync::atomic::AtomicBool>,
}

fn main() -> Result<()> {
    color_eyre::install().ok();
    let cli = Cli::parse();

    let runtime = KcoRuntime::build("kco-operator", None)?;
    let result = runtime.block_on(run(cli));
    runtime.shutdown(Duration::from_secs(5));
    result
}

async fn run(cli: Cli) -> Result<()> {
    let settings = SettingsLoader::new().load()?;

    let log_format = if settings.log_format == "json" {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_logging(LogConfig {
        app_name: "kco",
        format: log_format,
        default_filter: "info",
        ..Default::default()
    })?;

    tracing::info!(
        watch_namespace = %settings.watch_namespace,
        default_rate_limit_rpm = settings.default_rate_limit_rpm,
        "starting kco operator"
    );

    // A failure here is fatal: an operator that cannot reach the apiserver
    // has nothing useful to do, so it exits non-zero the way kopf does on
    // startup configuration errors rather than retrying indefinitely.
    let kube_client = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "failed to build Kubernetes client, exiting");
            std::process::exit(1);
        }
    };

    let cluster = Arc::new(KubeClusterClient::new(kube_client.clone()));
    let controller = Arc::new(Controller::new(
        cluster,
        settings.default_rate_limit_rpm,
        Duration::from_secs(settings.event_dedup_window_seconds),
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let cleanup_controller = controller.clone();
    let cleanup_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        cleanup_controller
            .run_cleanup(Duration::from_secs(settings.cleanup_interval_seconds), cleanup_shutdown)
            .await;
    });

    let state = AppState {
        controller: controller.clone(),
        ready: Arc::new(std::sync::atomic::AtomicBool::new(true)),
    };
    let health_port = settings.health_port;
    let metrics_port = settings.metrics_port;
    tokio::spawn(serve_health(state.clone(), health_port));
    tokio::spawn(serve_metrics(metrics_port));

    let namespace = cli.namespace.unwrap_or(settings.watch_namespace);
    let events = watch_target_apps(kube_client, &namespace);

    tokio::select! {
        _ = controller.run_watch(Box::pin(events)) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    }

    Ok(())
}

async fn serve_health(state: AppState, port: u16) {
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/stats", get(stats))
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!(error = %err, "health server exited");
            }
        }
        Err(err) => tracing::error!(error = %err, port, "failed to bind health server"),
    }
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.ready.load(std::sync::atomic::Ordering::Relaxed) {
        (axum::http::StatusCode::OK, "ready")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.controller.stats().await;
    axum::Json(serde_json::json!({
        "tapp_count": stats.tapp_count,
        "tenant_keys": stats.tenant_keys,
    }))
}

async fn serve_metrics(port: u16) {
    let app = Router::new().route("/metrics", get(metrics_handler));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!(error = %err, "metrics server exited");
            }
        }
        Err(err) => tracing::error!(error = %err, port, "failed to bind metrics server"),
    }
}

async fn metrics_handler() -> impl IntoResponse {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %err, "failed to encode metrics");
    }
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
}
