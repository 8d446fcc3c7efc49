//! The dispatch primitive: atomic claim under a row lock, lease lifecycle,
//! and completion.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};

use xvault_core::error::{ErrorKind, JobError};
use xvault_core::model::job::{EnqueueRequest, Job, JobPayload, JobStatus, JobType, LEASE_DURATION_SECS, MAX_ATTEMPTS};

/// Postgres-backed `JobStore`. Cheaply cloneable (wraps a `PgPool`).
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `queued` row. Emitting the best-effort queue wakeup signal
    /// is the caller's responsibility (`xvault-hub`'s queue client); this
    /// method only guarantees the authoritative row exists.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Validation`] if the request fails
    /// [`EnqueueRequest::validate`], or [`JobError::Store`] on a database
    /// error.
    pub async fn enqueue(&self, req: EnqueueRequest) -> Result<String, JobError> {
        req.validate()?;

        let id = xvault_core::ids::new_id();
        let now = Utc::now();
        let job_type_str = job_type_to_str(req.job_type);
        let payload_json = serde_json::to_value(&req.payload).map_err(|e| JobError::Store(e.to_string()))?;

        sqlx::query(
            "INSERT INTO jobs \
                (id, tenant_id, source_id, job_type, status, priority, target_worker_id, \
                 lease_expires_at, attempt, payload, created_at, updated_at, finished_at, \
                 error_code, error_message) \
             VALUES ($1, $2, $3, $4, 'queued', $5, $6, NULL, 0, $7, $8, $8, NULL, NULL, NULL)",
        )
        .bind(&id)
        .bind(&req.tenant_id)
        .bind(&req.source_id)
        .bind(job_type_str)
        .bind(req.resolved_priority())
        .bind(&req.target_worker_id)
        .bind(payload_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| JobError::Store(e.to_string()))?;

        Ok(id)
    }

    /// Atomically select one claimable row for `worker_id`, lock it,
    /// transition it to `running`, and stamp a fresh lease.
    ///
    /// Race-free across Hub replicas: `FOR UPDATE SKIP LOCKED` means two
    /// concurrent callers never lock the same row, so each either claims a
    /// distinct job or falls through to the next candidate / `NoJob`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NoJob`] if nothing is claimable, or
    /// [`JobError::Store`] on a database error.
    pub async fn claim(&self, worker_id: &str) -> Result<Job, JobError> {
        let mut tx = self.pool.begin().await.map_err(|e| JobError::Store(e.to_string()))?;

        let row = sqlx::query(
            "SELECT * FROM jobs \
             WHERE status = 'queued' \
               AND (target_worker_id IS NULL OR target_worker_id = $1) \
             ORDER BY priority DESC, created_at ASC \
             LIMIT 1 \
             FOR UPDATE SKIP LOCKED",
        )
        .bind(worker_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| JobError::Store(e.to_string()))?;

        let Some(row) = row else {
            tx.commit().await.map_err(|e| JobError::Store(e.to_string()))?;
            return Err(JobError::NoJob);
        };

        let job_id: String = row.try_get("id").map_err(|e| JobError::Store(e.to_string()))?;
        let attempt: i32 = row.try_get("attempt").map_err(|e| JobError::Store(e.to_string()))?;
        let now = Utc::now();

        if attempt >= MAX_ATTEMPTS {
            sqlx::query(
                "UPDATE jobs SET status = 'failed', updated_at = $2, finished_at = $2, \
                 error_code = $3, error_message = 'exceeded max attempts' WHERE id = $1",
            )
            .bind(&job_id)
            .bind(now)
            .bind(ErrorKind::Internal.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| JobError::Store(e.to_string()))?;
            tx.commit().await.map_err(|e| JobError::Store(e.to_string()))?;
            return Err(JobError::MaxAttemptsExceeded { job_id });
        }

        let lease_expires_at = now + Duration::seconds(LEASE_DURATION_SECS);

        sqlx::query(
            "UPDATE jobs SET status = 'running', target_worker_id = COALESCE(target_worker_id, $2), \
             lease_expires_at = $3, attempt = attempt + 1, updated_at = $4 WHERE id = $1",
        )
        .bind(&job_id)
        .bind(worker_id)
        .bind(lease_expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| JobError::Store(e.to_string()))?;

        let updated = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(&job_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| JobError::Store(e.to_string()))?;

        tx.commit().await.map_err(|e| JobError::Store(e.to_string()))?;

        row_to_job(&updated)
    }

    /// Renew a held lease. Fails if `worker_id` is not the current holder
    /// (e.g. the lease already expired and was reclaimed by another worker).
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`], [`JobError::NotLeaseHolder`], or
    /// [`JobError::Store`].
    pub async fn renew_lease(&self, job_id: &str, worker_id: &str) -> Result<DateTime<Utc>, JobError> {
        let now = Utc::now();
        let new_expiry = now + Duration::seconds(LEASE_DURATION_SECS);

        let result = sqlx::query(
            "UPDATE jobs SET lease_expires_at = $3, updated_at = $4 \
             WHERE id = $1 AND target_worker_id = $2 AND status = 'running'",
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(new_expiry)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| JobError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            if self.get(job_id).await.is_err() {
                return Err(JobError::NotFound { job_id: job_id.to_owned() });
            }
            return Err(JobError::NotLeaseHolder {
                job_id: job_id.to_owned(),
                worker_id: worker_id.to_owned(),
            });
        }

        Ok(new_expiry)
    }

    /// Transition a job to a terminal state. Only the lease holder may
    /// complete a job, and a job already in a terminal state cannot be
    /// completed again with a different outcome.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`], [`JobError::NotLeaseHolder`],
    /// [`JobError::AlreadyTerminal`], or [`JobError::Store`].
    pub async fn complete(
        &self,
        job_id: &str,
        worker_id: &str,
        status: JobStatus,
        error_code: Option<ErrorKind>,
        error_message: Option<String>,
    ) -> Result<(), JobError> {
        let job = self.get(job_id).await?;

        if job.status.is_terminal() {
            return Err(JobError::AlreadyTerminal { job_id: job_id.to_owned() });
        }
        if job.target_worker_id.as_deref() != Some(worker_id) {
            return Err(JobError::NotLeaseHolder {
                job_id: job_id.to_owned(),
                worker_id: worker_id.to_owned(),
            });
        }

        let now = Utc::now();
        let status_str = job_status_to_str(status);
        let error_code_str = error_code.map(|k| k.to_string());

        sqlx::query(
            "UPDATE jobs SET status = $2, updated_at = $3, finished_at = $3, \
             error_code = $4, error_message = $5 WHERE id = $1",
        )
        .bind(job_id)
        .bind(status_str)
        .bind(now)
        .bind(error_code_str)
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| JobError::Store(e.to_string()))?;

        Ok(())
    }

    /// Return any `running` row whose lease has expired to `queued`,
    /// preserving `target_worker_id` (affinity survives reclaim) and
    /// leaving `attempt` unchanged. Returns the reclaimed job ids.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Store`] on a database error.
    pub async fn reclaim_expired(&self) -> Result<Vec<String>, JobError> {
        let now = Utc::now();
        let rows = sqlx::query(
            "UPDATE jobs SET status = 'queued', lease_expires_at = NULL, updated_at = $1 \
             WHERE status = 'running' AND lease_expires_at < $1 \
             RETURNING id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| JobError::Store(e.to_string()))?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map_err(|e| JobError::Store(e.to_string())))
            .collect()
    }

    /// Fetch a single job by id.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] or [`JobError::Store`].
    pub async fn get(&self, job_id: &str) -> Result<Job, JobError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| JobError::Store(e.to_string()))?
            .ok_or_else(|| JobError::NotFound { job_id: job_id.to_owned() })?;

        row_to_job(&row)
    }

    /// List jobs for a tenant, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Store`] on a database error.
    pub async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Job>, JobError> {
        let rows = sqlx::query("SELECT * FROM jobs WHERE tenant_id = $1 ORDER BY created_at DESC")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| JobError::Store(e.to_string()))?;

        rows.iter().map(row_to_job).collect()
    }
}

fn job_type_to_str(t: JobType) -> &'static str {
    match t {
        JobType::Backup => "backup",
        JobType::Restore => "restore",
        JobType::DeleteSnapshot => "delete_snapshot",
    }
}

fn job_status_to_str(s: JobStatus) -> &'static str {
    match s {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Finalizing => "finalizing",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Canceled => "canceled",
    }
}

fn str_to_job_type(s: &str) -> Result<JobType, JobError> {
    match s {
        "backup" => Ok(JobType::Backup),
        "restore" => Ok(JobType::Restore),
        "delete_snapshot" => Ok(JobType::DeleteSnapshot),
        other => Err(JobError::Store(format!("unknown job_type '{other}'"))),
    }
}

fn str_to_job_status(s: &str) -> Result<JobStatus, JobError> {
    match s {
        "queued" => Ok(JobStatus::Queued),
        "running" => Ok(JobStatus::Running),
        "finalizing" => Ok(JobStatus::Finalizing),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        "canceled" => Ok(JobStatus::Canceled),
        other => Err(JobError::Store(format!("unknown status '{other}'"))),
    }
}

fn str_to_error_kind(s: &str) -> Result<ErrorKind, JobError> {
    match s {
        "VALIDATION" => Ok(ErrorKind::Validation),
        "NOT_FOUND" => Ok(ErrorKind::NotFound),
        "AUTH_FAILED" => Ok(ErrorKind::AuthFailed),
        "NETWORK" => Ok(ErrorKind::Network),
        "STORAGE_FULL" => Ok(ErrorKind::StorageFull),
        "IO" => Ok(ErrorKind::Io),
        "CRYPTO" => Ok(ErrorKind::Crypto),
        "LEASE_LOST" => Ok(ErrorKind::LeaseLost),
        "INTERNAL" => Ok(ErrorKind::Internal),
        other => Err(JobError::Store(format!("unknown error_code '{other}'"))),
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> Result<Job, JobError> {
    let job_type_str: String = row.try_get("job_type").map_err(|e| JobError::Store(e.to_string()))?;
    let status_str: String = row.try_get("status").map_err(|e| JobError::Store(e.to_string()))?;
    let payload_json: serde_json::Value = row.try_get("payload").map_err(|e| JobError::Store(e.to_string()))?;
    let error_code_str: Option<String> = row.try_get("error_code").map_err(|e| JobError::Store(e.to_string()))?;

    Ok(Job {
        id: row.try_get("id").map_err(|e| JobError::Store(e.to_string()))?,
        tenant_id: row.try_get("tenant_id").map_err(|e| JobError::Store(e.to_string()))?,
        source_id: row.try_get("source_id").map_err(|e| JobError::Store(e.to_string()))?,
        job_type: str_to_job_type(&job_type_str)?,
        status: str_to_job_status(&status_str)?,
        priority: row.try_get("priority").map_err(|e| JobError::Store(e.to_string()))?,
        target_worker_id: row.try_get("target_worker_id").map_err(|e| JobError::Store(e.to_string()))?,
        lease_expires_at: row.try_get("lease_expires_at").map_err(|e| JobError::Store(e.to_string()))?,
        attempt: row.try_get("attempt").map_err(|e| JobError::Store(e.to_string()))?,
        payload: serde_json::from_value::<JobPayload>(payload_json).map_err(|e| JobError::Store(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| JobError::Store(e.to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|e| JobError::Store(e.to_string()))?,
        finished_at: row.try_get("finished_at").map_err(|e| JobError::Store(e.to_string()))?,
        error_code: error_code_str.map(|s| str_to_error_kind(&s)).transpose()?,
        error_message: row.try_get("error_message").map_err(|e| JobError::Store(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_str() {
        for t in [JobType::Backup, JobType::Restore, JobType::DeleteSnapshot] {
            assert_eq!(str_to_job_type(job_type_to_str(t)).unwrap(), t);
        }
    }

    #[test]
    fn job_status_round_trips_through_str() {
        for s in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Finalizing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Canceled,
        ] {
            assert_eq!(str_to_job_status(job_status_to_str(s)).unwrap(), s);
        }
    }

    #[test]
    fn error_kind_round_trips_through_str() {
        for k in [ErrorKind::Validation, ErrorKind::LeaseLost, ErrorKind::StorageFull] {
            assert_eq!(str_to_error_kind(&k.to_string()).unwrap(), k);
        }
    }
}
