//! Source CRUD: `POST/GET /v1/sources`, `GET/PUT/DELETE /v1/sources/{id}`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use xvault_core::model::source::{Source, SourceType};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/sources", post(create_source).get(list_sources))
        .route("/v1/sources/{id}", get(get_source).put(disable_source).delete(disable_source))
}

#[derive(Deserialize)]
struct CreateSourceRequest {
    tenant_id: String,
    #[serde(rename = "type")]
    source_type: SourceType,
    name: String,
    credential_id: String,
    #[serde(default)]
    config: serde_json::Value,
}

#[derive(Deserialize)]
struct TenantQuery {
    tenant_id: String,
}

async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSourceRequest>,
) -> Result<Json<Source>, AppError> {
    let source = state
        .sources
        .create(&req.tenant_id, req.source_type, &req.name, req.config, &req.credential_id)
        .await?;
    Ok(Json(source))
}

async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Vec<Source>>, AppError> {
    let sources = state.sources.list_for_tenant(&q.tenant_id).await?;
    Ok(Json(sources))
}

async fn get_source(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Source>, AppError> {
    let source = state.sources.get(&id).await?;
    Ok(Json(source))
}

/// `PUT`/`DELETE` both soft-disable: a source with existing snapshots is
/// never hard-deleted, per spec.md §6.
async fn disable_source(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Source>, AppError> {
    state.sources.disable(&id).await?;
    let source = state.sources.get(&id).await?;
    Ok(Json(source))
}
