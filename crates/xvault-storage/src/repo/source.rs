//! Source repository.

use chrono::Utc;
use sqlx::{PgPool, Row};

use xvault_core::model::source::{Source, SourceStatus, SourceType};

use crate::error::StoreError;

#[derive(Clone)]
pub struct SourceStore {
    pool: PgPool,
}

impl SourceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn create(
        &self,
        tenant_id: &str,
        source_type: SourceType,
        name: &str,
        config: serde_json::Value,
        credential_id: &str,
    ) -> Result<Source, StoreError> {
        let now = Utc::now();
        let source = Source {
            id: xvault_core::ids::new_id(),
            tenant_id: tenant_id.to_owned(),
            source_type,
            name: name.to_owned(),
            status: SourceStatus::Active,
            config,
            credential_id: credential_id.to_owned(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO sources \
                (id, tenant_id, source_type, name, status, config, credential_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, 'active', $5, $6, $7, $7)",
        )
        .bind(&source.id)
        .bind(&source.tenant_id)
        .bind(source_type_to_str(source_type))
        .bind(&source.name)
        .bind(&source.config)
        .bind(&source.credential_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(source)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::Database`].
    pub async fn get(&self, id: &str) -> Result<Source, StoreError> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;

        row_to_source(&row)
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Source>, StoreError> {
        let rows = sqlx::query("SELECT * FROM sources WHERE tenant_id = $1 ORDER BY created_at ASC")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_source).collect()
    }

    /// Soft-disable a source (sources with existing snapshots are never
    /// hard-deleted).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on a database error.
    pub async fn disable(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE sources SET status = 'disabled', updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn source_type_to_str(t: SourceType) -> &'static str {
    match t {
        SourceType::Ssh => "ssh",
        SourceType::Sftp => "sftp",
        SourceType::Ftp => "ftp",
        SourceType::Mysql => "mysql",
        SourceType::Postgres => "postgres",
        SourceType::Wordpress => "wordpress",
    }
}

fn str_to_source_type(s: &str) -> Result<SourceType, StoreError> {
    match s {
        "ssh" => Ok(SourceType::Ssh),
        "sftp" => Ok(SourceType::Sftp),
        "ftp" => Ok(SourceType::Ftp),
        "mysql" => Ok(SourceType::Mysql),
        "postgres" => Ok(SourceType::Postgres),
        "wordpress" => Ok(SourceType::Wordpress),
        other => Err(StoreError::Database(format!("unknown source_type '{other}'"))),
    }
}

fn row_to_source(row: &sqlx::postgres::PgRow) -> Result<Source, StoreError> {
    let source_type_str: String = row.try_get("source_type")?;
    let status_str: String = row.try_get("status")?;
    Ok(Source {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        source_type: str_to_source_type(&source_type_str)?,
        name: row.try_get("name")?,
        status: match status_str.as_str() {
            "active" => SourceStatus::Active,
            "disabled" => SourceStatus::Disabled,
            other => return Err(StoreError::Database(format!("unknown status '{other}'"))),
        },
        config: row.try_get("config")?,
        credential_id: row.try_get("credential_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trips_through_str() {
        for t in [
            SourceType::Ssh,
            SourceType::Sftp,
            SourceType::Ftp,
            SourceType::Mysql,
            SourceType::Postgres,
            SourceType::Wordpress,
        ] {
            assert_eq!(str_to_source_type(source_type_to_str(t)).unwrap(), t);
        }
    }
}
