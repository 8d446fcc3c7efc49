//! Schedule CRUD: `POST/GET /v1/schedules`, `GET/PUT/DELETE /v1/schedules/{id}`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use xvault_core::model::retention::RetentionPolicy;
use xvault_core::model::schedule::Schedule;
use xvault_core::schedule_calc;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/schedules", post(create_schedule).get(list_schedules))
        .route("/v1/schedules/{id}", get(get_schedule).put(update_schedule).delete(delete_schedule))
}

#[derive(Deserialize)]
struct TenantQuery {
    tenant_id: String,
}

#[derive(Deserialize)]
struct ScheduleTrigger {
    tenant_id: String,
    source_id: String,
    cron: Option<String>,
    interval_minutes: Option<i64>,
    timezone: String,
    #[serde(default)]
    retention_policy: RetentionPolicy,
}

async fn create_schedule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScheduleTrigger>,
) -> Result<Json<Schedule>, AppError> {
    schedule_calc::parse_timezone(&req.timezone).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let next_run_at = if let Some(cron) = &req.cron {
        schedule_calc::validate_cron(cron).map_err(|e| AppError::BadRequest(e.to_string()))?;
        probe_next_run(cron.clone(), None, &req.timezone)?
    } else {
        probe_next_run(None, req.interval_minutes, &req.timezone)?
    };

    let schedule = state
        .schedules
        .create(&req.tenant_id, &req.source_id, req.cron, req.interval_minutes, &req.timezone, req.retention_policy, next_run_at)
        .await?;

    Ok(Json(schedule))
}

async fn list_schedules(State(state): State<Arc<AppState>>, Query(q): Query<TenantQuery>) -> Result<Json<Vec<Schedule>>, AppError> {
    let schedules = state.schedules.list_for_tenant(&q.tenant_id).await?;
    Ok(Json(schedules))
}

async fn get_schedule(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Schedule>, AppError> {
    let schedule = state.schedules.get(&id).await?;
    Ok(Json(schedule))
}

async fn update_schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ScheduleTrigger>,
) -> Result<Json<Schedule>, AppError> {
    schedule_calc::parse_timezone(&req.timezone).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let next_run_at = if let Some(cron) = &req.cron {
        schedule_calc::validate_cron(cron).map_err(|e| AppError::BadRequest(e.to_string()))?;
        probe_next_run(cron.clone(), None, &req.timezone)?
    } else {
        probe_next_run(None, req.interval_minutes, &req.timezone)?
    };

    let schedule = state
        .schedules
        .update(&id, req.cron, req.interval_minutes, &req.timezone, req.retention_policy, next_run_at)
        .await?;

    Ok(Json(schedule))
}

async fn delete_schedule(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<(), AppError> {
    state.schedules.disable(&id).await?;
    Ok(())
}

/// Compute `next_run_at` against "now" for a fresh trigger definition, using
/// a throwaway [`Schedule`] shell so we reuse `schedule_calc::next_run_from_now`.
fn probe_next_run(
    cron: impl Into<Option<String>>,
    interval_minutes: Option<i64>,
    timezone: &str,
) -> Result<chrono::DateTime<chrono::Utc>, AppError> {
    let shell = Schedule {
        id: String::new(),
        tenant_id: String::new(),
        source_id: String::new(),
        cron: cron.into(),
        interval_minutes,
        timezone: timezone.to_owned(),
        status: xvault_core::model::schedule::ScheduleStatus::Enabled,
        retention_policy: RetentionPolicy::default(),
        last_run_at: None,
        next_run_at: chrono::Utc::now(),
    };
    schedule_calc::next_run_from_now(&shell).map_err(|e| AppError::BadRequest(e.to_string()))
}
