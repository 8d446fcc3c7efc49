//! Worker entry point.
//!
//! Registers with the Hub, then runs the ClaimLoop and a liveness heartbeat
//! loop side by side until `SIGTERM`/Ctrl-C, at which point it stops
//! accepting new claims and gives in-flight jobs a bounded grace period to
//! finish before exiting.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

use xvault_core::crypto::Kek;
use xvault_core::model::job::LEASE_DURATION_SECS;
use xvault_worker::claim_loop::ClaimLoop;
use xvault_worker::config::WorkerConfig;
use xvault_worker::hardening;
use xvault_worker::hub_client::HubClient;
use xvault_worker::local_store::LocalStore;

/// Shutdown grace period: lets in-flight jobs finish rather than abandoning
/// them mid-lease (spec.md §5, design 2× `LEASE_DURATION`).
fn shutdown_grace_period() -> Duration {
    Duration::from_secs((2 * LEASE_DURATION_SECS) as u64)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env().map_err(anyhow::Error::msg)?;

    apply_hardening(&config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(worker_id = %config.worker_id, hub = %config.hub_base_url, "xvault-worker starting");

    let kek = Kek::from_base64(&config.encryption_kek_b64).map_err(|e| anyhow::anyhow!("invalid HUB_ENCRYPTION_KEK: {e}"))?;

    let store = Arc::new(LocalStore::new(&config.storage_base_path));
    tokio::fs::create_dir_all(&config.storage_base_path)
        .await
        .with_context(|| format!("failed to create storage base {}", config.storage_base_path))?;

    let hub = Arc::new(HubClient::new(config.hub_base_url.clone(), config.worker_id.clone()));

    hub.register(&config.name, &config.storage_base_path, &capabilities())
        .await
        .context("failed to register with hub")?;
    info!("registered with hub");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let heartbeat_handle = {
        let hub = Arc::clone(&hub);
        let mut rx = shutdown_rx.clone();
        let interval_secs = config.heartbeat_interval_secs;
        tokio::spawn(async move { liveness_heartbeat(&hub, &mut rx, interval_secs).await })
    };

    let claim_loop = Arc::new(ClaimLoop::new(
        Arc::clone(&hub),
        Arc::clone(&store),
        kek,
        config.worker_id.clone(),
        config.max_concurrency,
        config.poll_interval_secs,
        config.allow_insecure_host_keys,
    ));

    let claim_loop_handle = {
        let claim_loop = Arc::clone(&claim_loop);
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { claim_loop.run(rx).await })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received; draining");
    let _ = hub.heartbeat("draining", None).await;
    let _ = shutdown_tx.send(true);

    let grace = shutdown_grace_period();
    if tokio::time::timeout(grace, claim_loop_handle).await.is_err() {
        warn!(grace_secs = grace.as_secs(), "claim loop did not finish in-flight jobs within the grace period");
    }
    let _ = tokio::time::timeout(Duration::from_secs(10), heartbeat_handle).await;

    let _ = hub.heartbeat("offline", None).await;
    info!("xvault-worker stopped");
    Ok(())
}

/// Capabilities reported at registration, currently just the connector
/// types this build supports end-to-end (spec.md §4.5).
fn capabilities() -> Vec<String> {
    vec!["ssh".to_owned(), "sftp".to_owned()]
}

async fn liveness_heartbeat(hub: &HubClient, shutdown: &mut watch::Receiver<bool>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    info!(interval_secs, "liveness heartbeat started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = hub.heartbeat("online", None).await {
                    warn!(error = %e, "heartbeat to hub failed");
                }
            }
            _ = shutdown.changed() => {
                info!("liveness heartbeat shutting down");
                return;
            }
        }
    }
}

async fn wait_for_shutdown_signal() {
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
}

#[allow(clippy::print_stderr)]
fn apply_hardening(config: &WorkerConfig) {
    if let Err(e) = hardening::disable_core_dumps() {
        eprintln!("WARNING: failed to disable core dumps: {e}");
    }

    if config.disable_mlock {
        eprintln!("WARNING: mlock disabled via WORKER_DISABLE_MLOCK, decrypted credentials may be swapped to disk");
    } else if let Err(e) = hardening::lock_memory() {
        eprintln!("WARNING: failed to lock memory: {e} (set WORKER_DISABLE_MLOCK=true for dev)");
    }
}
