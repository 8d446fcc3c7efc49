//! `POST /v1/tenants`, create a tenant and its active artifact keypair.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/tenants", post(create_tenant))
}

#[derive(Deserialize)]
struct CreateTenantRequest {
    name: String,
}

#[derive(Serialize)]
struct CreateTenantResponse {
    id: String,
    name: String,
    public_key: String,
}

async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTenantRequest>,
) -> Result<Json<CreateTenantResponse>, AppError> {
    let tenant = state.tenants.create(&req.name).await?;
    let key = state.vault.create_tenant_keypair(&tenant.id).await?;

    Ok(Json(CreateTenantResponse {
        id: tenant.id,
        name: tenant.name,
        public_key: key.public_key,
    }))
}
