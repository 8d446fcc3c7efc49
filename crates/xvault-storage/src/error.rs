//! Errors for repositories that have no dedicated domain error type in
//! `xvault-core` (tenant, source, worker, plain CRUD over their tables).
//! `JobStore`, `ScheduleStore`, and `CredentialStore` use `xvault-core`'s
//! `JobError`/`ScheduleError`/`VaultError` instead, since those carry
//! domain-specific variants the Hub needs to branch on.

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}
