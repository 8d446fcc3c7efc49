//! Worker configuration.
//!
//! Loaded entirely from environment variables; there is no config file.

/// Worker process configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Stable identity for this worker process, persisted across restarts
    /// so `target_worker_id` affinity on restore/delete jobs keeps resolving
    /// to the disk that actually holds the bytes.
    pub worker_id: String,
    /// Human-readable name reported at registration.
    pub name: String,
    /// Root of this worker's local snapshot filesystem.
    pub storage_base_path: String,
    /// Base URL of the Hub's internal API.
    pub hub_base_url: String,
    /// Base64-encoded 32-byte symmetric key-encryption-key, shared with the
    /// Hub out-of-band. Source credentials travel from Hub to Worker as
    /// KEK ciphertext; only a process holding this key can open them
    /// (spec.md §4.7).
    pub encryption_kek_b64: String,
    /// Upper bound on jobs this process runs concurrently.
    pub max_concurrency: usize,
    /// Fallback claim-poll cadence; the queue wakeup signal is the fast path.
    pub poll_interval_secs: u64,
    /// Heartbeat cadence reported to the Hub (worker liveness, not lease renewal).
    pub heartbeat_interval_secs: u64,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_level: String,
    /// Skip `mlockall` in development (requires `CAP_IPC_LOCK` otherwise).
    pub disable_mlock: bool,
    /// Allow SSH/SFTP connections without host-key verification. Every use
    /// is logged at `warn` per spec; default is verified-only.
    pub allow_insecure_host_keys: bool,
}

impl WorkerConfig {
    /// Load configuration from the environment.
    ///
    /// Environment variables:
    /// - `WORKER_ID`, stable worker identity (required).
    /// - `WORKER_NAME`, human-readable name (default: `WORKER_ID`).
    /// - `WORKER_STORAGE_BASE`, local snapshot root (default `/var/lib/xvault/backups`).
    /// - `HUB_BASE_URL`, base URL of the Hub's internal API (required).
    /// - `HUB_ENCRYPTION_KEK`, base64 32-byte KEK, shared with the Hub (required).
    /// - `WORKER_MAX_CONCURRENCY`, concurrent job cap (default `4`).
    /// - `WORKER_POLL_INTERVAL_SECS`, fallback claim-poll cadence (default `5`).
    /// - `WORKER_HEARTBEAT_INTERVAL_SECS`, liveness heartbeat cadence (default `15`).
    /// - `WORKER_LOG_LEVEL`, log filter (default `info`).
    /// - `WORKER_DISABLE_MLOCK`, set `true` to skip `mlockall` in development.
    /// - `WORKER_ALLOW_INSECURE_HOST_KEYS`, set `true` to skip SSH host-key
    ///   verification (development only; every connection logs a warning).
    ///
    /// # Errors
    ///
    /// Returns an error string naming the first missing required variable.
    pub fn from_env() -> Result<Self, String> {
        let worker_id = std::env::var("WORKER_ID").map_err(|_| "WORKER_ID is required".to_owned())?;
        let hub_base_url = std::env::var("HUB_BASE_URL").map_err(|_| "HUB_BASE_URL is required".to_owned())?;
        let encryption_kek_b64 =
            std::env::var("HUB_ENCRYPTION_KEK").map_err(|_| "HUB_ENCRYPTION_KEK is required".to_owned())?;

        let name = std::env::var("WORKER_NAME").unwrap_or_else(|_| worker_id.clone());

        let storage_base_path =
            std::env::var("WORKER_STORAGE_BASE").unwrap_or_else(|_| "/var/lib/xvault/backups".to_owned());

        let max_concurrency = std::env::var("WORKER_MAX_CONCURRENCY").ok().and_then(|v| v.parse().ok()).unwrap_or(4);

        let poll_interval_secs =
            std::env::var("WORKER_POLL_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(5);

        let heartbeat_interval_secs =
            std::env::var("WORKER_HEARTBEAT_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(15);

        let log_level = std::env::var("WORKER_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
        let disable_mlock = std::env::var("WORKER_DISABLE_MLOCK").as_deref() == Ok("true");
        let allow_insecure_host_keys = std::env::var("WORKER_ALLOW_INSECURE_HOST_KEYS").as_deref() == Ok("true");

        Ok(Self {
            worker_id,
            name,
            storage_base_path,
            hub_base_url,
            encryption_kek_b64,
            max_concurrency,
            poll_interval_secs,
            heartbeat_interval_secs,
            log_level,
            disable_mlock,
            allow_insecure_host_keys,
        })
    }
}
