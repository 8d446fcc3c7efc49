//! `POST /v1/jobs`, manually trigger a backup; `GET /v1/jobs(/{id})`, inspect.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use xvault_core::model::job::{EnqueueRequest, Job, JobPayload, JobType};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/jobs", post(create_job).get(list_jobs))
        .route("/v1/jobs/{id}", get(get_job))
}

#[derive(Deserialize)]
struct TenantQuery {
    tenant_id: String,
}

#[derive(Deserialize)]
struct CreateJobRequest {
    source_id: String,
    priority: Option<i32>,
}

#[derive(Serialize)]
struct CreateJobResponse {
    job_id: String,
}

/// Manually enqueue a backup job for a source, bypassing its schedule.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TenantQuery>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<CreateJobResponse>, AppError> {
    let source = state.sources.get(&req.source_id).await?;
    if source.tenant_id != q.tenant_id {
        return Err(AppError::NotFound(format!("source '{}' not found for tenant", req.source_id)));
    }

    let payload = JobPayload::Backup {
        source_id: source.id.clone(),
        credential_id: source.credential_id.clone(),
        source_config: source.config.clone(),
        source_type: source.source_type,
    };

    let job_id = state
        .jobs
        .enqueue(EnqueueRequest {
            tenant_id: q.tenant_id,
            source_id: Some(source.id),
            job_type: JobType::Backup,
            payload,
            priority: req.priority,
            target_worker_id: None,
        })
        .await?;

    state.queue.wake();

    Ok(Json(CreateJobResponse { job_id }))
}

async fn list_jobs(State(state): State<Arc<AppState>>, Query(q): Query<TenantQuery>) -> Result<Json<Vec<Job>>, AppError> {
    let jobs = state.jobs.list_for_tenant(&q.tenant_id).await?;
    Ok(Json(jobs))
}

async fn get_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Job>, AppError> {
    let job = state.jobs.get(&id).await?;
    Ok(Json(job))
}
