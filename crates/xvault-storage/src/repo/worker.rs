//! Worker registry repository.

use chrono::Utc;
use sqlx::{PgPool, Row};

use xvault_core::model::worker::{Worker, WorkerStatus};

use crate::error::StoreError;

#[derive(Clone)]
pub struct WorkerRegistry {
    pool: PgPool,
}

impl WorkerRegistry {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Upsert a worker's heartbeat row. Called on worker startup and on
    /// every heartbeat tick; `id` is operator-assigned and stable, so this
    /// is always an upsert rather than a separate register step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn heartbeat(
        &self,
        id: &str,
        name: &str,
        status: WorkerStatus,
        capabilities: &[String],
        storage_base_path: &str,
        system_metrics: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO workers (id, name, status, capabilities, storage_base_path, last_seen_at, system_metrics) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, status = EXCLUDED.status, capabilities = EXCLUDED.capabilities, \
                storage_base_path = EXCLUDED.storage_base_path, last_seen_at = EXCLUDED.last_seen_at, \
                system_metrics = EXCLUDED.system_metrics",
        )
        .bind(id)
        .bind(name)
        .bind(worker_status_to_str(status))
        .bind(serde_json::to_value(capabilities).map_err(|e| StoreError::Database(e.to_string()))?)
        .bind(storage_base_path)
        .bind(Utc::now())
        .bind(system_metrics)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update only the status column (e.g. `draining` on graceful shutdown).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn set_status(&self, id: &str, status: WorkerStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE workers SET status = $2, last_seen_at = $3 WHERE id = $1")
            .bind(id)
            .bind(worker_status_to_str(status))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::Database`].
    pub async fn get(&self, id: &str) -> Result<Worker, StoreError> {
        let row = sqlx::query("SELECT * FROM workers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;

        row_to_worker(&row)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn list(&self) -> Result<Vec<Worker>, StoreError> {
        let rows = sqlx::query("SELECT * FROM workers ORDER BY id ASC").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_worker).collect()
    }
}

fn worker_status_to_str(s: WorkerStatus) -> &'static str {
    match s {
        WorkerStatus::Online => "online",
        WorkerStatus::Offline => "offline",
        WorkerStatus::Draining => "draining",
    }
}

fn row_to_worker(row: &sqlx::postgres::PgRow) -> Result<Worker, StoreError> {
    let status_str: String = row.try_get("status")?;
    let capabilities_json: serde_json::Value = row.try_get("capabilities")?;
    Ok(Worker {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: match status_str.as_str() {
            "online" => WorkerStatus::Online,
            "offline" => WorkerStatus::Offline,
            "draining" => WorkerStatus::Draining,
            other => return Err(StoreError::Database(format!("unknown status '{other}'"))),
        },
        capabilities: serde_json::from_value(capabilities_json).map_err(|e| StoreError::Database(e.to_string()))?,
        storage_base_path: row.try_get("storage_base_path")?,
        last_seen_at: row.try_get("last_seen_at")?,
        system_metrics: row.try_get("system_metrics")?,
    })
}
