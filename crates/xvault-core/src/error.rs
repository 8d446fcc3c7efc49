//! Error taxonomy for the xVault orchestration core.
//!
//! Every boundary operation (claim, complete, enqueue, pull, encrypt) returns
//! a domain-specific `thiserror` enum. Each variant maps to exactly one
//! [`ErrorKind`] so that the Hub and Worker can propagate a stable
//! machine-readable code without leaking internal detail. Crypto errors
//! never include key material, only key identifiers or operation
//! descriptions.

use serde::{Deserialize, Serialize};

/// The stable error-kind taxonomy from the orchestration core's error
/// handling design. `error_code` on a job row is always one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed input; returned to caller, not retried.
    Validation,
    /// Missing resource; returned to caller.
    NotFound,
    /// Credential rejected by source; fail the job, do not retry.
    AuthFailed,
    /// Transient network failure; retryable up to `MAX_ATTEMPTS`.
    Network,
    /// Worker-local storage failure (disk full or I/O error).
    StorageFull,
    /// Worker-local I/O failure not specifically a full-disk condition.
    Io,
    /// Key missing or corrupt; fatal for the job, not retryable.
    Crypto,
    /// Worker could not renew its lease; in-flight job aborted.
    LeaseLost,
    /// Unexpected internal bug; log with context, fail job.
    Internal,
}

impl ErrorKind {
    /// Whether a job failed with this kind should be retried by re-queueing
    /// rather than moved straight to `failed`.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Io | Self::StorageFull)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::AuthFailed => "AUTH_FAILED",
            Self::Network => "NETWORK",
            Self::StorageFull => "STORAGE_FULL",
            Self::Io => "IO",
            Self::Crypto => "CRYPTO",
            Self::LeaseLost => "LEASE_LOST",
            Self::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Errors from cryptographic operations (KEK envelope, tenant keypair, age).
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AES-256-GCM encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// AES-256-GCM decryption failed (wrong key, corrupted ciphertext, or tampered tag).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// HKDF key derivation failed.
    #[error("key derivation failed for context '{context}': {reason}")]
    KeyDerivation { context: String, reason: String },

    /// Ciphertext is too short to contain a valid nonce + tag.
    #[error("ciphertext too short: expected at least {expected} bytes, got {actual}")]
    CiphertextTooShort { expected: usize, actual: usize },

    /// age (x25519) recipient/identity parsing or stream encryption failed.
    #[error("age operation failed: {reason}")]
    Age { reason: String },
}

impl CryptoError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Crypto
    }
}

/// Errors from job lifecycle operations (enqueue/claim/renew/complete).
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No job matched the claim predicate.
    #[error("no queued job available")]
    NoJob,

    /// The job id does not exist.
    #[error("job not found: {job_id}")]
    NotFound { job_id: String },

    /// `RenewLease`/`Complete` called by a worker that does not hold the lease.
    #[error("worker {worker_id} does not hold the lease for job {job_id}")]
    NotLeaseHolder { job_id: String, worker_id: String },

    /// `Complete` called with a final state that contradicts a prior terminal state.
    #[error("job {job_id} already completed with a different terminal status")]
    AlreadyTerminal { job_id: String },

    /// The job exceeded `MAX_ATTEMPTS` and was moved straight to failed.
    #[error("job {job_id} exceeded max attempts")]
    MaxAttemptsExceeded { job_id: String },

    /// Invalid enqueue parameters (e.g. missing `target_worker_id` for an
    /// affinity-bound job type).
    #[error("invalid job request: {reason}")]
    Validation { reason: String },

    /// The underlying store returned an error.
    #[error("job store error: {0}")]
    Store(String),
}

impl JobError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoJob | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotLeaseHolder { .. } | Self::AlreadyTerminal { .. } => ErrorKind::Validation,
            Self::MaxAttemptsExceeded { .. } => ErrorKind::Internal,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Errors from schedule engine operations.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Schedule references a source that does not exist or is disabled.
    #[error("source not found or disabled: {source_id}")]
    SourceUnavailable { source_id: String },

    /// Neither `cron` nor `interval_minutes` set, or both set.
    #[error("schedule must set exactly one of cron or interval_minutes")]
    InvalidTrigger,

    /// The cron expression failed to parse.
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    /// The IANA timezone name is not recognized.
    #[error("invalid timezone: {tz}")]
    InvalidTimezone { tz: String },

    /// A source already has a schedule (at most one per source).
    #[error("source {source_id} already has a schedule")]
    AlreadyScheduled { source_id: String },

    /// The underlying store returned an error.
    #[error("schedule store error: {0}")]
    Store(String),
}

impl ScheduleError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnavailable { .. } => ErrorKind::NotFound,
            Self::InvalidTrigger | Self::InvalidCron { .. } | Self::InvalidTimezone { .. } => {
                ErrorKind::Validation
            }
            Self::AlreadyScheduled { .. } => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Errors surfaced by a connector's `Pull` operation.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The remote rejected the supplied credential.
    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// A transient network error (timeout, connection reset, DNS failure).
    #[error("network error: {reason}")]
    Network { reason: String },

    /// A configured remote path does not exist.
    #[error("remote path not found: {path}")]
    NotFound { path: String },

    /// The connector type has no implementation yet.
    #[error("connector not implemented: {source_type}")]
    NotImplemented { source_type: String },

    /// Aggregated per-file errors after the first few.
    #[error("{count} file(s) failed to transfer; first error: {first}")]
    PartialFailure { count: usize, first: String },
}

impl ConnectorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailed { .. } => ErrorKind::AuthFailed,
            Self::Network { .. } => ErrorKind::Network,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotImplemented { .. } => ErrorKind::Internal,
            Self::PartialFailure { .. } => ErrorKind::Io,
        }
    }
}

/// Errors from packaging (tar/zstd/age) or local filesystem storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageOpError {
    /// Generic filesystem I/O failure.
    #[error("filesystem error: {reason}")]
    Io { reason: String },

    /// The filesystem reported it is out of space.
    #[error("storage full: {reason}")]
    StorageFull { reason: String },

    /// A path would resolve outside the worker's storage base, refused.
    #[error("path escapes storage base: {path}")]
    PathConfinement { path: String },

    /// Archive or compression stage failed.
    #[error("packaging failed: {reason}")]
    Packaging { reason: String },

    /// Encryption stage failed.
    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),
}

impl StorageOpError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::StorageFull { .. } => ErrorKind::StorageFull,
            Self::PathConfinement { .. } => ErrorKind::Validation,
            Self::Packaging { .. } => ErrorKind::Internal,
            Self::Crypto(_) => ErrorKind::Crypto,
        }
    }
}

/// Errors from credential/tenant-key vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The credential id does not exist.
    #[error("credential not found: {id}")]
    CredentialNotFound { id: String },

    /// The tenant has no active key (should be impossible post-creation).
    #[error("tenant {tenant_id} has no active key")]
    NoActiveKey { tenant_id: String },

    /// Envelope encryption/decryption failed.
    #[error("vault crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The underlying store returned an error.
    #[error("vault store error: {0}")]
    Store(String),
}

impl VaultError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialNotFound { .. } => ErrorKind::NotFound,
            Self::NoActiveKey { .. } => ErrorKind::Internal,
            Self::Crypto(_) => ErrorKind::Crypto,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Io.is_retryable());
        assert!(ErrorKind::StorageFull.is_retryable());
        assert!(!ErrorKind::AuthFailed.is_retryable());
        assert!(!ErrorKind::Crypto.is_retryable());
    }

    #[test]
    fn display_matches_screaming_snake() {
        assert_eq!(ErrorKind::AuthFailed.to_string(), "AUTH_FAILED");
        assert_eq!(ErrorKind::StorageFull.to_string(), "STORAGE_FULL");
    }
}
