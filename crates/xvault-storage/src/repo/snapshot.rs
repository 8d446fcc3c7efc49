//! Snapshot registry. Created on backup completion; deleted only by a
//! successful `delete_snapshot` job.

use sqlx::{PgPool, Row};

use xvault_core::model::snapshot::{Locator, Snapshot, SnapshotStatus};
use xvault_core::retention::SnapshotRef;

use crate::error::StoreError;

#[derive(Clone)]
pub struct SnapshotRegistry {
    pool: PgPool,
}

impl SnapshotRegistry {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let locator_json = serde_json::to_value(&snapshot.locator).map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "INSERT INTO snapshots \
                (id, tenant_id, source_id, job_id, status, size_bytes, started_at, finished_at, \
                 duration_ms, manifest, encryption_algorithm, encryption_key_id, locator, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(&snapshot.id)
        .bind(&snapshot.tenant_id)
        .bind(&snapshot.source_id)
        .bind(&snapshot.job_id)
        .bind(snapshot_status_to_str(snapshot.status))
        .bind(snapshot.size_bytes)
        .bind(snapshot.started_at)
        .bind(snapshot.finished_at)
        .bind(snapshot.duration_ms)
        .bind(&snapshot.manifest)
        .bind(&snapshot.encryption_algorithm)
        .bind(&snapshot.encryption_key_id)
        .bind(locator_json)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::Database`].
    pub async fn get(&self, id: &str) -> Result<Snapshot, StoreError> {
        let row = sqlx::query("SELECT * FROM snapshots WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;

        row_to_snapshot(&row)
    }

    /// Completed snapshots for a source, oldest first, the ordering
    /// `xvault-core::retention::evaluate` requires.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn completed_for_source(&self, source_id: &str) -> Result<Vec<Snapshot>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM snapshots WHERE source_id = $1 AND status = 'completed' ORDER BY created_at ASC",
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_snapshot).collect()
    }

    /// Same as [`SnapshotRegistry::completed_for_source`], projected down to
    /// the minimal shape `xvault-core::retention::evaluate` consumes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn retention_refs_for_source(&self, source_id: &str) -> Result<Vec<SnapshotRef>, StoreError> {
        let snapshots = self.completed_for_source(source_id).await?;
        Ok(snapshots
            .into_iter()
            .map(|s| SnapshotRef {
                worker_id: s.locator.worker_id().map(str::to_owned),
                id: s.id,
                created_at: s.created_at,
            })
            .collect())
    }

    /// Remove a snapshot row after its `delete_snapshot` job completes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM snapshots WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }
}

fn snapshot_status_to_str(s: SnapshotStatus) -> &'static str {
    match s {
        SnapshotStatus::Completed => "completed",
        SnapshotStatus::Failed => "failed",
    }
}

fn row_to_snapshot(row: &sqlx::postgres::PgRow) -> Result<Snapshot, StoreError> {
    let status_str: String = row.try_get("status")?;
    let locator_json: serde_json::Value = row.try_get("locator")?;

    Ok(Snapshot {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        source_id: row.try_get("source_id")?,
        job_id: row.try_get("job_id")?,
        status: match status_str.as_str() {
            "completed" => SnapshotStatus::Completed,
            "failed" => SnapshotStatus::Failed,
            other => return Err(StoreError::Database(format!("unknown status '{other}'"))),
        },
        size_bytes: row.try_get("size_bytes")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        duration_ms: row.try_get("duration_ms")?,
        manifest: row.try_get("manifest")?,
        encryption_algorithm: row.try_get("encryption_algorithm")?,
        encryption_key_id: row.try_get("encryption_key_id")?,
        locator: serde_json::from_value::<Locator>(locator_json).map_err(|e| StoreError::Database(e.to_string()))?,
        created_at: row.try_get("created_at")?,
    })
}
