//! Connection pool setup and table bootstrap.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres and create every table this crate owns if it does
/// not already exist. Safe to call on every process start; `CREATE TABLE
/// IF NOT EXISTS` makes it idempotent across Hub replicas racing to boot.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` if the connection or any bootstrap
/// statement fails.
pub async fn connect_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;

    bootstrap(&pool).await?;

    Ok(pool)
}

async fn bootstrap(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tenants ( \
            id TEXT PRIMARY KEY, \
            name TEXT NOT NULL, \
            created_at TIMESTAMPTZ NOT NULL \
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tenant_keys ( \
            id TEXT PRIMARY KEY, \
            tenant_id TEXT NOT NULL REFERENCES tenants(id), \
            algorithm TEXT NOT NULL, \
            public_key TEXT NOT NULL, \
            encrypted_private_key BYTEA NOT NULL, \
            key_status TEXT NOT NULL, \
            created_at TIMESTAMPTZ NOT NULL \
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_tenant_keys_one_active \
         ON tenant_keys (tenant_id) WHERE key_status = 'active'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS credentials ( \
            id TEXT PRIMARY KEY, \
            tenant_id TEXT NOT NULL REFERENCES tenants(id), \
            kind TEXT NOT NULL, \
            ciphertext BYTEA NOT NULL, \
            key_id TEXT NOT NULL, \
            created_at TIMESTAMPTZ NOT NULL \
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sources ( \
            id TEXT PRIMARY KEY, \
            tenant_id TEXT NOT NULL REFERENCES tenants(id), \
            source_type TEXT NOT NULL, \
            name TEXT NOT NULL, \
            status TEXT NOT NULL, \
            config JSONB NOT NULL, \
            credential_id TEXT NOT NULL REFERENCES credentials(id), \
            created_at TIMESTAMPTZ NOT NULL, \
            updated_at TIMESTAMPTZ NOT NULL \
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sources_tenant ON sources (tenant_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schedules ( \
            id TEXT PRIMARY KEY, \
            tenant_id TEXT NOT NULL REFERENCES tenants(id), \
            source_id TEXT NOT NULL UNIQUE REFERENCES sources(id), \
            cron TEXT, \
            interval_minutes BIGINT, \
            timezone TEXT NOT NULL, \
            status TEXT NOT NULL, \
            retention_policy JSONB NOT NULL, \
            last_run_at TIMESTAMPTZ, \
            next_run_at TIMESTAMPTZ NOT NULL \
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_schedules_due \
         ON schedules (next_run_at) WHERE status = 'enabled'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS workers ( \
            id TEXT PRIMARY KEY, \
            name TEXT NOT NULL, \
            status TEXT NOT NULL, \
            capabilities JSONB NOT NULL, \
            storage_base_path TEXT NOT NULL, \
            last_seen_at TIMESTAMPTZ NOT NULL, \
            system_metrics JSONB \
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS jobs ( \
            id TEXT PRIMARY KEY, \
            tenant_id TEXT NOT NULL REFERENCES tenants(id), \
            source_id TEXT REFERENCES sources(id), \
            job_type TEXT NOT NULL, \
            status TEXT NOT NULL, \
            priority INT NOT NULL, \
            target_worker_id TEXT, \
            lease_expires_at TIMESTAMPTZ, \
            attempt INT NOT NULL DEFAULT 0, \
            payload JSONB NOT NULL, \
            created_at TIMESTAMPTZ NOT NULL, \
            updated_at TIMESTAMPTZ NOT NULL, \
            finished_at TIMESTAMPTZ, \
            error_code TEXT, \
            error_message TEXT \
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_claimable \
         ON jobs (status, priority DESC, created_at ASC) WHERE status = 'queued'",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_lease_expiry \
         ON jobs (lease_expires_at) WHERE status = 'running'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS snapshots ( \
            id TEXT PRIMARY KEY, \
            tenant_id TEXT NOT NULL REFERENCES tenants(id), \
            source_id TEXT NOT NULL REFERENCES sources(id), \
            job_id TEXT NOT NULL REFERENCES jobs(id), \
            status TEXT NOT NULL, \
            size_bytes BIGINT NOT NULL, \
            started_at TIMESTAMPTZ NOT NULL, \
            finished_at TIMESTAMPTZ NOT NULL, \
            duration_ms BIGINT NOT NULL, \
            manifest JSONB NOT NULL, \
            encryption_algorithm TEXT NOT NULL, \
            encryption_key_id TEXT NOT NULL, \
            locator JSONB NOT NULL, \
            created_at TIMESTAMPTZ NOT NULL \
        )",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_source_created \
         ON snapshots (source_id, created_at ASC) WHERE status = 'completed'",
    )
    .execute(pool)
    .await?;

    Ok(())
}
