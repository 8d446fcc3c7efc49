//! Schedule repository.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use xvault_core::error::ScheduleError;
use xvault_core::model::retention::RetentionPolicy;
use xvault_core::model::schedule::{Schedule, ScheduleStatus};

#[derive(Clone)]
pub struct ScheduleStore {
    pool: PgPool,
}

impl ScheduleStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a schedule for a source. A source may have at most one.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidTrigger`] if the trigger fields are
    /// malformed, [`ScheduleError::AlreadyScheduled`] if the source already
    /// has one, or [`ScheduleError::Store`] on a database error.
    pub async fn create(
        &self,
        tenant_id: &str,
        source_id: &str,
        cron: Option<String>,
        interval_minutes: Option<i64>,
        timezone: &str,
        retention_policy: RetentionPolicy,
        next_run_at: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        let schedule = Schedule {
            id: xvault_core::ids::new_id(),
            tenant_id: tenant_id.to_owned(),
            source_id: source_id.to_owned(),
            cron,
            interval_minutes,
            timezone: timezone.to_owned(),
            status: ScheduleStatus::Enabled,
            retention_policy,
            last_run_at: None,
            next_run_at,
        };
        schedule.validate_trigger()?;

        let retention_json = serde_json::to_value(&schedule.retention_policy).map_err(|e| ScheduleError::Store(e.to_string()))?;

        sqlx::query(
            "INSERT INTO schedules \
                (id, tenant_id, source_id, cron, interval_minutes, timezone, status, \
                 retention_policy, last_run_at, next_run_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'enabled', $7, NULL, $8)",
        )
        .bind(&schedule.id)
        .bind(&schedule.tenant_id)
        .bind(&schedule.source_id)
        .bind(&schedule.cron)
        .bind(schedule.interval_minutes)
        .bind(&schedule.timezone)
        .bind(retention_json)
        .bind(schedule.next_run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ScheduleError::AlreadyScheduled { source_id: source_id.to_owned() }
            } else {
                ScheduleError::Store(e.to_string())
            }
        })?;

        Ok(schedule)
    }

    /// All `enabled` schedules due at or before `now`, for the tick loop.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Store`] on a database error.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>, ScheduleError> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE status = 'enabled' AND next_run_at <= $1")
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?;

        rows.iter().map(row_to_schedule).collect()
    }

    /// Claim a fire: stamp `last_run_at` and the newly computed `next_run_at`,
    /// conditional on `next_run_at` still matching `previous_next_run_at` (the
    /// value read by [`ScheduleStore::due`]). Returns `true` if this call won
    /// the claim; `false` means another replica already claimed this fire, and
    /// the caller must not enqueue a job for it.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Store`] on a database error.
    pub async fn record_fire(
        &self,
        id: &str,
        previous_next_run_at: DateTime<Utc>,
        fired_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, ScheduleError> {
        let result = sqlx::query(
            "UPDATE schedules SET last_run_at = $2, next_run_at = $3 \
             WHERE id = $1 AND next_run_at = $4",
        )
        .bind(id)
        .bind(fired_at)
        .bind(next_run_at)
        .bind(previous_next_run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Store(e.to_string()))?;
        Ok(result.rows_affected() == 1)
    }

    /// All schedules for a tenant's sources, newest-created-source first.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Store`] on a database error.
    pub async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Schedule>, ScheduleError> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?;

        rows.iter().map(row_to_schedule).collect()
    }

    /// # Errors
    ///
    /// Returns [`ScheduleError::Store`] on a database error.
    pub async fn get_for_source(&self, source_id: &str) -> Result<Option<Schedule>, ScheduleError> {
        let row = sqlx::query("SELECT * FROM schedules WHERE source_id = $1")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?;

        row.as_ref().map(row_to_schedule).transpose()
    }

    /// # Errors
    ///
    /// Returns [`ScheduleError::Store`] on a database error.
    pub async fn get(&self, id: &str) -> Result<Schedule, ScheduleError> {
        let row = sqlx::query("SELECT * FROM schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?
            .ok_or_else(|| ScheduleError::SourceUnavailable { source_id: id.to_owned() })?;

        row_to_schedule(&row)
    }

    /// Replace the trigger and retention policy on an existing schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidTrigger`] if the new trigger fields
    /// are malformed, or [`ScheduleError::Store`] on a database error.
    pub async fn update(
        &self,
        id: &str,
        cron: Option<String>,
        interval_minutes: Option<i64>,
        timezone: &str,
        retention_policy: RetentionPolicy,
        next_run_at: DateTime<Utc>,
    ) -> Result<Schedule, ScheduleError> {
        let mut schedule = self.get(id).await?;
        schedule.cron = cron;
        schedule.interval_minutes = interval_minutes;
        schedule.timezone = timezone.to_owned();
        schedule.retention_policy = retention_policy;
        schedule.next_run_at = next_run_at;
        schedule.validate_trigger()?;

        let retention_json = serde_json::to_value(&schedule.retention_policy).map_err(|e| ScheduleError::Store(e.to_string()))?;

        sqlx::query(
            "UPDATE schedules SET cron = $2, interval_minutes = $3, timezone = $4, \
             retention_policy = $5, next_run_at = $6 WHERE id = $1",
        )
        .bind(id)
        .bind(&schedule.cron)
        .bind(schedule.interval_minutes)
        .bind(&schedule.timezone)
        .bind(retention_json)
        .bind(schedule.next_run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ScheduleError::Store(e.to_string()))?;

        Ok(schedule)
    }

    /// Disable a schedule; it stops firing but is kept for audit history.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Store`] on a database error.
    pub async fn disable(&self, id: &str) -> Result<(), ScheduleError> {
        sqlx::query("UPDATE schedules SET status = 'disabled' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ScheduleError::Store(e.to_string()))?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn row_to_schedule(row: &sqlx::postgres::PgRow) -> Result<Schedule, ScheduleError> {
    let status_str: String = row.try_get("status").map_err(|e| ScheduleError::Store(e.to_string()))?;
    let retention_json: serde_json::Value = row.try_get("retention_policy").map_err(|e| ScheduleError::Store(e.to_string()))?;

    Ok(Schedule {
        id: row.try_get("id").map_err(|e| ScheduleError::Store(e.to_string()))?,
        tenant_id: row.try_get("tenant_id").map_err(|e| ScheduleError::Store(e.to_string()))?,
        source_id: row.try_get("source_id").map_err(|e| ScheduleError::Store(e.to_string()))?,
        cron: row.try_get("cron").map_err(|e| ScheduleError::Store(e.to_string()))?,
        interval_minutes: row.try_get("interval_minutes").map_err(|e| ScheduleError::Store(e.to_string()))?,
        timezone: row.try_get("timezone").map_err(|e| ScheduleError::Store(e.to_string()))?,
        status: match status_str.as_str() {
            "enabled" => ScheduleStatus::Enabled,
            "disabled" => ScheduleStatus::Disabled,
            other => return Err(ScheduleError::Store(format!("unknown status '{other}'"))),
        },
        retention_policy: serde_json::from_value(retention_json).map_err(|e| ScheduleError::Store(e.to_string()))?,
        last_run_at: row.try_get("last_run_at").map_err(|e| ScheduleError::Store(e.to_string()))?,
        next_run_at: row.try_get("next_run_at").map_err(|e| ScheduleError::Store(e.to_string()))?,
    })
}
