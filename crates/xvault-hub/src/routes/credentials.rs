//! `POST /v1/credentials`, envelope-encrypt and store a tenant secret.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use xvault_core::model::credential::CredentialKind;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/v1/credentials", post(create_credential))
}

#[derive(Deserialize)]
struct CreateCredentialRequest {
    tenant_id: String,
    kind: CredentialKind,
    plaintext_b64: String,
}

#[derive(Serialize)]
struct CreateCredentialResponse {
    id: String,
    tenant_id: String,
    kind: CredentialKind,
    /// Ciphertext shown for debug only, per spec.md §6.
    ciphertext_b64: String,
}

async fn create_credential(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCredentialRequest>,
) -> Result<Json<CreateCredentialResponse>, AppError> {
    use base64::Engine as _;
    let plaintext = base64::engine::general_purpose::STANDARD
        .decode(&req.plaintext_b64)
        .map_err(|e| AppError::BadRequest(format!("invalid plaintext_b64: {e}")))?;

    let credential = state.vault.store_credential(&req.tenant_id, req.kind, &plaintext).await?;

    Ok(Json(CreateCredentialResponse {
        id: credential.id,
        tenant_id: credential.tenant_id,
        kind: credential.kind,
        ciphertext_b64: base64::engine::general_purpose::STANDARD.encode(&credential.ciphertext),
    }))
}
