//! Credential repository. Stores only ciphertext; envelope encrypt/decrypt
//! orchestration lives in `xvault-hub`'s `CredentialVault`, which calls
//! `xvault-core::crypto` and uses this store purely for persistence.

use chrono::Utc;
use sqlx::{PgPool, Row};

use xvault_core::error::VaultError;
use xvault_core::model::credential::{Credential, CredentialKind};

#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

impl CredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns [`VaultError::Store`] on a database error.
    pub async fn insert(
        &self,
        tenant_id: &str,
        kind: CredentialKind,
        ciphertext: &[u8],
        key_id: &str,
    ) -> Result<Credential, VaultError> {
        let credential = Credential {
            id: xvault_core::ids::new_id(),
            tenant_id: tenant_id.to_owned(),
            kind,
            ciphertext: ciphertext.to_vec(),
            key_id: key_id.to_owned(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO credentials (id, tenant_id, kind, ciphertext, key_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&credential.id)
        .bind(&credential.tenant_id)
        .bind(credential_kind_to_str(kind))
        .bind(&credential.ciphertext)
        .bind(&credential.key_id)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| VaultError::Store(e.to_string()))?;

        Ok(credential)
    }

    /// # Errors
    ///
    /// Returns [`VaultError::CredentialNotFound`] or [`VaultError::Store`].
    pub async fn get(&self, id: &str) -> Result<Credential, VaultError> {
        let row = sqlx::query("SELECT * FROM credentials WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VaultError::Store(e.to_string()))?
            .ok_or_else(|| VaultError::CredentialNotFound { id: id.to_owned() })?;

        row_to_credential(&row)
    }
}

fn credential_kind_to_str(k: CredentialKind) -> &'static str {
    match k {
        CredentialKind::Source => "source",
        CredentialKind::Storage => "storage",
    }
}

fn row_to_credential(row: &sqlx::postgres::PgRow) -> Result<Credential, VaultError> {
    let kind_str: String = row.try_get("kind").map_err(|e| VaultError::Store(e.to_string()))?;
    Ok(Credential {
        id: row.try_get("id").map_err(|e| VaultError::Store(e.to_string()))?,
        tenant_id: row.try_get("tenant_id").map_err(|e| VaultError::Store(e.to_string()))?,
        kind: match kind_str.as_str() {
            "source" => CredentialKind::Source,
            "storage" => CredentialKind::Storage,
            other => return Err(VaultError::Store(format!("unknown kind '{other}'"))),
        },
        ciphertext: row.try_get("ciphertext").map_err(|e| VaultError::Store(e.to_string()))?,
        key_id: row.try_get("key_id").map_err(|e| VaultError::Store(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| VaultError::Store(e.to_string()))?,
    })
}
