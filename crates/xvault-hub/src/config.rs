//! Hub configuration.
//!
//! Loaded entirely from environment variables; there is no config file.

use std::net::SocketAddr;

/// Hub process configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Base64-encoded 32-byte symmetric key-encryption-key.
    pub encryption_kek_b64: String,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_level: String,
    /// Schedule tick interval.
    pub schedule_tick_secs: u64,
    /// Lease-expiry reclaim scan interval.
    pub lease_reclaim_interval_secs: u64,
    /// Retention debounce lock TTL, keyed by `source_id`.
    pub retention_cooldown_secs: u64,
    /// Optional external queue URL. Unset means the in-process notifier is
    /// the only wakeup signal and the periodic claim poll is the fallback,
    /// see `xvault-hub::queue`.
    pub queue_url: Option<String>,
    /// Skip `mlockall` in development (requires `CAP_IPC_LOCK` otherwise).
    pub disable_mlock: bool,
}

impl HubConfig {
    /// Load configuration from the environment.
    ///
    /// Environment variables:
    /// - `DATABASE_URL`, Postgres connection string (required).
    /// - `HUB_BIND_ADDR`, bind address (default `0.0.0.0:8080`).
    /// - `HUB_ENCRYPTION_KEK`, base64 32-byte KEK (required).
    /// - `HUB_LOG_LEVEL`, log filter (default `info`).
    /// - `HUB_SCHEDULE_TICK_SECS`, schedule tick cadence (default `30`).
    /// - `HUB_LEASE_RECLAIM_INTERVAL_SECS`, lease reclaim cadence (default `30`).
    /// - `HUB_RETENTION_COOLDOWN_SECS`, per-source debounce TTL (default `60`).
    /// - `QUEUE_URL`, optional external wakeup queue (default unset).
    /// - `HUB_DISABLE_MLOCK`, set `true` to skip `mlockall` in development.
    ///
    /// # Errors
    ///
    /// Returns an error string naming the first missing required variable.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is required".to_owned())?;
        let encryption_kek_b64 =
            std::env::var("HUB_ENCRYPTION_KEK").map_err(|_| "HUB_ENCRYPTION_KEK is required".to_owned())?;

        let bind_addr = std::env::var("HUB_BIND_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let log_level = std::env::var("HUB_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        let schedule_tick_secs = std::env::var("HUB_SCHEDULE_TICK_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30);

        let lease_reclaim_interval_secs = std::env::var("HUB_LEASE_RECLAIM_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let retention_cooldown_secs =
            std::env::var("HUB_RETENTION_COOLDOWN_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(60);

        let queue_url = std::env::var("QUEUE_URL").ok();
        let disable_mlock = std::env::var("HUB_DISABLE_MLOCK").as_deref() == Ok("true");

        Ok(Self {
            database_url,
            bind_addr,
            encryption_kek_b64,
            log_level,
            schedule_tick_secs,
            lease_reclaim_interval_secs,
            retention_cooldown_secs,
            queue_url,
            disable_mlock,
        })
    }
}
