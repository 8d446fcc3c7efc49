//! The Worker-facing surface: registration, heartbeat, claim, lease renewal,
//! completion, and the two read-only lookups a worker needs to run a
//! pipeline (credential ciphertext, tenant public key).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use xvault_core::error::ErrorKind;
use xvault_core::model::job::{Job, JobStatus};
use xvault_core::model::snapshot::{Locator, Snapshot, SnapshotStatus};
use xvault_core::model::worker::WorkerStatus;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/internal/workers/register", post(register_worker))
        .route("/internal/workers/heartbeat", post(heartbeat_worker))
        .route("/internal/jobs/claim", post(claim_job))
        .route("/internal/jobs/{id}/lease", post(renew_lease))
        .route("/internal/jobs/{id}/complete", post(complete_job))
        .route("/internal/credentials/{id}", get(get_credential))
        .route("/internal/tenants/{id}/public-key", get(get_public_key))
}

#[derive(Deserialize)]
struct RegisterWorkerRequest {
    worker_id: String,
    name: String,
    storage_base_path: String,
    #[serde(default)]
    capabilities: Vec<String>,
}

async fn register_worker(State(state): State<Arc<AppState>>, Json(req): Json<RegisterWorkerRequest>) -> Result<(), AppError> {
    state
        .workers
        .heartbeat(&req.worker_id, &req.name, WorkerStatus::Online, &req.capabilities, &req.storage_base_path, None)
        .await?;
    Ok(())
}

#[derive(Deserialize)]
struct HeartbeatWorkerRequest {
    worker_id: String,
    status: WorkerStatus,
    system_metrics: Option<serde_json::Value>,
}

async fn heartbeat_worker(State(state): State<Arc<AppState>>, Json(req): Json<HeartbeatWorkerRequest>) -> Result<(), AppError> {
    let worker = state.workers.get(&req.worker_id).await?;
    state
        .workers
        .heartbeat(&req.worker_id, &worker.name, req.status, &worker.capabilities, &worker.storage_base_path, req.system_metrics)
        .await?;
    Ok(())
}

#[derive(Deserialize)]
struct ClaimRequest {
    worker_id: String,
}

async fn claim_job(State(state): State<Arc<AppState>>, Json(req): Json<ClaimRequest>) -> Result<Json<Job>, AppError> {
    let job = state.jobs.claim(&req.worker_id).await?;
    Ok(Json(job))
}

#[derive(Deserialize)]
struct LeaseRenewalRequest {
    worker_id: String,
}

#[derive(Serialize)]
struct LeaseRenewalResponse {
    lease_expires_at: chrono::DateTime<chrono::Utc>,
}

/// Not part of spec.md's literal endpoint list, but required by the
/// Hub/Worker split it describes: `RenewLease` (§4.2) has no transport
/// without this route, and a worker executing a multi-hour pull has no
/// other way to keep its lease alive across the process boundary.
async fn renew_lease(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<LeaseRenewalRequest>,
) -> Result<Json<LeaseRenewalResponse>, AppError> {
    let lease_expires_at = state.jobs.renew_lease(&id, &req.worker_id).await?;
    Ok(Json(LeaseRenewalResponse { lease_expires_at }))
}

#[derive(Deserialize)]
struct CompletedSnapshotReport {
    size_bytes: i64,
    started_at: chrono::DateTime<chrono::Utc>,
    finished_at: chrono::DateTime<chrono::Utc>,
    duration_ms: i64,
    manifest: serde_json::Value,
    encryption_algorithm: String,
    encryption_key_id: String,
    local_path: String,
}

#[derive(Deserialize)]
struct CompleteJobRequest {
    worker_id: String,
    status: JobStatus,
    error_code: Option<ErrorKind>,
    error_message: Option<String>,
    /// Present only when `status == completed` and `job_type == backup`.
    snapshot: Option<CompletedSnapshotReport>,
}

async fn complete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CompleteJobRequest>,
) -> Result<(), AppError> {
    let job = state.jobs.get(&id).await?;

    if let Some(report) = req.snapshot {
        let Some(source_id) = job.source_id.clone() else {
            return Err(AppError::BadRequest(format!("job '{id}' has no source_id; cannot record snapshot")));
        };
        let snapshot = Snapshot {
            id: xvault_core::ids::new_id(),
            tenant_id: job.tenant_id.clone(),
            source_id,
            job_id: job.id.clone(),
            status: SnapshotStatus::Completed,
            size_bytes: report.size_bytes,
            started_at: report.started_at,
            finished_at: report.finished_at,
            duration_ms: report.duration_ms,
            manifest: report.manifest,
            encryption_algorithm: report.encryption_algorithm,
            encryption_key_id: report.encryption_key_id,
            locator: Locator::LocalFs { worker_id: req.worker_id.clone(), local_path: report.local_path },
            created_at: chrono::Utc::now(),
        };
        state.snapshots.insert(&snapshot).await?;
    }

    state.jobs.complete(&id, &req.worker_id, req.status, req.error_code, req.error_message).await?;

    if req.status == JobStatus::Completed {
        if let Some(source_id) = job.source_id {
            state.retention.trigger(&source_id).await;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct CredentialResponse {
    ciphertext_b64: String,
    key_id: String,
}

async fn get_credential(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<CredentialResponse>, AppError> {
    use base64::Engine as _;
    let credential = state.vault.get_credential(&id).await?;
    Ok(Json(CredentialResponse {
        ciphertext_b64: base64::engine::general_purpose::STANDARD.encode(&credential.ciphertext),
        key_id: credential.key_id,
    }))
}

#[derive(Serialize)]
struct PublicKeyResponse {
    public_key: String,
}

async fn get_public_key(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<PublicKeyResponse>, AppError> {
    let public_key = state.vault.active_public_key(&id).await?;
    Ok(Json(PublicKeyResponse { public_key }))
}
