//! Tenant and tenant-key repository.

use chrono::Utc;
use sqlx::{PgPool, Row};

use xvault_core::model::tenant::{KeyStatus, Tenant, TenantKey};

use crate::error::StoreError;

#[derive(Clone)]
pub struct TenantStore {
    pool: PgPool,
}

impl TenantStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a tenant. Callers must follow up with
    /// [`TenantStore::insert_key`] to give it its active keypair, the two
    /// steps are separate because key generation lives in `xvault-core`'s
    /// crypto module, which this crate does not depend on for key material.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn create(&self, name: &str) -> Result<Tenant, StoreError> {
        let tenant = Tenant {
            id: xvault_core::ids::new_id(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO tenants (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(&tenant.id)
            .bind(&tenant.name)
            .bind(tenant.created_at)
            .execute(&self.pool)
            .await?;

        Ok(tenant)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::Database`].
    pub async fn get(&self, id: &str) -> Result<Tenant, StoreError> {
        let row = sqlx::query("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;

        Ok(Tenant {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn list(&self) -> Result<Vec<Tenant>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tenants ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Tenant {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Insert a tenant's active keypair row. The plaintext private key
    /// never reaches this method, `encrypted_private_key` is already the
    /// KEK-sealed ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn insert_key(
        &self,
        tenant_id: &str,
        algorithm: &str,
        public_key: &str,
        encrypted_private_key: &[u8],
    ) -> Result<TenantKey, StoreError> {
        let key = TenantKey {
            id: xvault_core::ids::new_id(),
            tenant_id: tenant_id.to_owned(),
            algorithm: algorithm.to_owned(),
            public_key: public_key.to_owned(),
            encrypted_private_key: encrypted_private_key.to_vec(),
            key_status: KeyStatus::Active,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO tenant_keys \
                (id, tenant_id, algorithm, public_key, encrypted_private_key, key_status, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'active', $6)",
        )
        .bind(&key.id)
        .bind(&key.tenant_id)
        .bind(&key.algorithm)
        .bind(&key.public_key)
        .bind(&key.encrypted_private_key)
        .bind(key.created_at)
        .execute(&self.pool)
        .await?;

        Ok(key)
    }

    /// Fetch a tenant's currently active key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::Database`].
    pub async fn active_key(&self, tenant_id: &str) -> Result<TenantKey, StoreError> {
        let row = sqlx::query("SELECT * FROM tenant_keys WHERE tenant_id = $1 AND key_status = 'active'")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("active key for tenant {tenant_id}")))?;

        row_to_key(&row)
    }
}

fn row_to_key(row: &sqlx::postgres::PgRow) -> Result<TenantKey, StoreError> {
    let status_str: String = row.try_get("key_status")?;
    Ok(TenantKey {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        algorithm: row.try_get("algorithm")?,
        public_key: row.try_get("public_key")?,
        encrypted_private_key: row.try_get("encrypted_private_key")?,
        key_status: match status_str.as_str() {
            "active" => KeyStatus::Active,
            "rotated" => KeyStatus::Rotated,
            "disabled" => KeyStatus::Disabled,
            other => return Err(StoreError::Database(format!("unknown key_status '{other}'"))),
        },
        created_at: row.try_get("created_at")?,
    })
}
