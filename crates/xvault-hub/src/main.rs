//! Hub entry point.
//!
//! Bootstraps the connection pool, credential vault, and background
//! subsystems, then starts the Axum HTTP server with graceful shutdown. The
//! schedule engine and lease-reclaim scan run alongside the server and are
//! cancelled on shutdown.

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use xvault_core::crypto::Kek;
use xvault_hub::config::HubConfig;
use xvault_hub::credential_vault::CredentialVault;
use xvault_hub::queue::QueueSignal;
use xvault_hub::retention_trigger::RetentionTrigger;
use xvault_hub::schedule_engine::ScheduleEngine;
use xvault_hub::state::AppState;
use xvault_hub::{hardening, routes};
use xvault_storage::repo::{CredentialStore, JobStore, ScheduleStore, SnapshotRegistry, SourceStore, TenantStore, WorkerRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = HubConfig::from_env().map_err(anyhow::Error::msg)?;

    apply_hardening(&config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(bind_addr = %config.bind_addr, "xvault-hub starting");

    let state = build_app_state(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let schedule_handle = {
        let engine = Arc::new(ScheduleEngine::new(state.schedules.clone(), state.sources.clone(), state.jobs.clone(), state.queue.clone()));
        let rx = shutdown_rx.clone();
        let interval_secs = config.schedule_tick_secs;
        tokio::spawn(async move { engine.run(interval_secs, rx).await })
    };

    let lease_reclaim_handle = {
        let jobs = state.jobs.clone();
        let mut rx = shutdown_rx.clone();
        let interval_secs = config.lease_reclaim_interval_secs;
        tokio::spawn(async move { lease_reclaim_worker(jobs, &mut rx, interval_secs).await })
    };

    let app = build_router(Arc::clone(&state));

    let listener = TcpListener::bind(config.bind_addr).await.with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "xvault-hub listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx)).await.context("server error")?;

    info!("waiting for background workers to stop");
    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), schedule_handle).await;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), lease_reclaim_handle).await;

    info!("xvault-hub stopped");
    Ok(())
}

async fn build_app_state(config: &HubConfig) -> anyhow::Result<Arc<AppState>> {
    let pool = xvault_storage::connect_pool(&config.database_url).await.context("failed to connect to database")?;

    let kek = Kek::from_base64(&config.encryption_kek_b64).map_err(|e| anyhow::anyhow!("invalid HUB_ENCRYPTION_KEK: {e}"))?;

    let jobs = JobStore::new(pool.clone());
    let schedules = ScheduleStore::new(pool.clone());
    let snapshots = SnapshotRegistry::new(pool.clone());
    let sources = SourceStore::new(pool.clone());
    let tenants = TenantStore::new(pool.clone());
    let workers = WorkerRegistry::new(pool.clone());
    let credentials = CredentialStore::new(pool.clone());

    let vault = CredentialVault::new(credentials.clone(), tenants.clone(), kek);
    let queue = QueueSignal::new(config.queue_url.clone());
    let retention = RetentionTrigger::new(schedules.clone(), snapshots.clone(), jobs.clone(), config.retention_cooldown_secs);

    Ok(Arc::new(AppState { jobs, schedules, snapshots, sources, tenants, workers, credentials, vault, queue, retention }))
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::PUT, axum::http::Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]);

    // TODO: mount an auth middleware layer over `internal_router()` once a
    // worker-to-hub credential scheme is chosen (mutual TLS or a bearer
    // token minted at worker registration); both are out of scope per
    // spec.md's Non-goals and are left as a deployment-time concern.
    Router::new()
        .merge(routes::public_router())
        .merge(routes::internal_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(axum::http::header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")))
        .layer(SetResponseHeaderLayer::overriding(axum::http::header::CACHE_CONTROL, HeaderValue::from_static("no-store")))
        .with_state(state)
}

async fn lease_reclaim_worker(jobs: JobStore, shutdown: &mut watch::Receiver<bool>, interval_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    info!(interval_secs, "lease reclaim worker started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match jobs.reclaim_expired().await {
                    Ok(reclaimed) if reclaimed.is_empty() => {}
                    Ok(reclaimed) => info!(count = reclaimed.len(), "reclaimed expired leases"),
                    Err(e) => tracing::warn!(error = %e, "lease reclaim scan failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("lease reclaim worker shutting down");
                return;
            }
        }
    }
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}

#[allow(clippy::print_stderr)]
fn apply_hardening(config: &HubConfig) {
    if let Err(e) = hardening::disable_core_dumps() {
        eprintln!("WARNING: failed to disable core dumps: {e}");
    }

    if config.disable_mlock {
        eprintln!("WARNING: mlock disabled via HUB_DISABLE_MLOCK, the KEK may be swapped to disk");
    } else if let Err(e) = hardening::lock_memory() {
        eprintln!("WARNING: failed to lock memory: {e} (set HUB_DISABLE_MLOCK=true for dev)");
    }
}
