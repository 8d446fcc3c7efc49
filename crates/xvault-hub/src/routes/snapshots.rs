//! `GET /v1/snapshots(/{id})` and `POST /v1/snapshots/{id}/download` (restore).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use xvault_core::model::job::{EnqueueRequest, JobPayload, JobType};
use xvault_core::model::snapshot::Snapshot;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/snapshots", get(list_snapshots))
        .route("/v1/snapshots/{id}", get(get_snapshot))
        .route("/v1/snapshots/{id}/download", post(request_restore))
}

#[derive(Deserialize)]
struct ListSnapshotsQuery {
    tenant_id: String,
    source_id: String,
}

#[derive(Serialize)]
struct RestoreResponse {
    job_id: String,
}

async fn list_snapshots(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListSnapshotsQuery>,
) -> Result<Json<Vec<Snapshot>>, AppError> {
    let snapshots = state
        .snapshots
        .completed_for_source(&q.source_id)
        .await?
        .into_iter()
        .filter(|s| s.tenant_id == q.tenant_id)
        .collect();
    Ok(Json(snapshots))
}

async fn get_snapshot(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Snapshot>, AppError> {
    let snapshot = state.snapshots.get(&id).await?;
    Ok(Json(snapshot))
}

/// Enqueue a `restore` job bound to the worker that holds the snapshot's
/// bytes (affinity, per spec.md §4.3).
async fn request_restore(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RestoreResponse>, AppError> {
    let snapshot = state.snapshots.get(&id).await?;
    let worker_id = snapshot
        .locator
        .worker_id()
        .ok_or_else(|| AppError::BadRequest(format!("snapshot '{id}' has no worker affinity to restore from")))?
        .to_owned();

    let job_id = state
        .jobs
        .enqueue(EnqueueRequest {
            tenant_id: snapshot.tenant_id,
            source_id: Some(snapshot.source_id.clone()),
            job_type: JobType::Restore,
            payload: JobPayload::Restore { snapshot_id: snapshot.id, source_id: snapshot.source_id },
            priority: None,
            target_worker_id: Some(worker_id),
        })
        .await?;

    state.queue.wake();

    Ok(Json(RestoreResponse { job_id }))
}
