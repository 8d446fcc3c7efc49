//! Job domain types, the dispatch unit at the heart of the orchestration core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, JobError};

/// Fixed lease window. Workers must renew at `LEASE_DURATION / 3` cadence
/// (the heartbeat interval) to stay comfortably inside the `/ 2` bound the
/// spec requires.
pub const LEASE_DURATION_SECS: i64 = 30 * 60;

/// Heartbeat cadence for a worker holding a lease on a running job.
pub const LEASE_HEARTBEAT_SECS: i64 = LEASE_DURATION_SECS / 3;

/// A claim is retried this many times before the job is moved to `failed`.
pub const MAX_ATTEMPTS: i32 = 3;

/// Default priority for scheduled and ordinary manual jobs.
pub const PRIORITY_DEFAULT: i32 = 5;

/// Priority for admin-triggered, manual, and retention-driven delete jobs.
pub const PRIORITY_HIGH: i32 = 10;

/// The closed set of job kinds. Payload shape is discriminated by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Backup,
    Restore,
    DeleteSnapshot,
}

impl JobType {
    /// Whether this job type requires worker affinity (`target_worker_id`
    /// must be set at enqueue time because the job operates on worker-local
    /// bytes).
    #[must_use]
    pub fn requires_affinity(self) -> bool {
        matches!(self, Self::Restore | Self::DeleteSnapshot)
    }
}

/// Job lifecycle status. Transitions are monotone except lease expiry,
/// which returns `Running` to `Queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Finalizing,
    Completed,
    Failed,
    Canceled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// Discriminated job payload. Carries everything the worker needs except
/// secret material: `credential_id`, not plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Backup {
        source_id: String,
        credential_id: String,
        source_config: serde_json::Value,
        source_type: crate::model::source::SourceType,
    },
    Restore {
        snapshot_id: String,
        source_id: String,
    },
    DeleteSnapshot {
        snapshot_id: String,
    },
}

/// A dispatchable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub tenant_id: String,
    pub source_id: Option<String>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub target_worker_id: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub attempt: i32,
    pub payload: JobPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_code: Option<ErrorKind>,
    pub error_message: Option<String>,
}

/// Parameters accepted by `JobStore::enqueue`.
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub source_id: Option<String>,
    pub job_type: JobType,
    pub payload: JobPayload,
    pub priority: Option<i32>,
    pub target_worker_id: Option<String>,
}

impl EnqueueRequest {
    /// Validate the invariant that affinity-bound job types carry a target
    /// worker and priority defaults are applied.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Validation`] if `job_type` requires affinity but
    /// `target_worker_id` is unset.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.job_type.requires_affinity() && self.target_worker_id.is_none() {
            return Err(JobError::Validation {
                reason: format!("{:?} jobs require target_worker_id", self.job_type),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn resolved_priority(&self) -> i32 {
        self.priority.unwrap_or(PRIORITY_DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_and_delete_require_affinity() {
        assert!(JobType::Restore.requires_affinity());
        assert!(JobType::DeleteSnapshot.requires_affinity());
        assert!(!JobType::Backup.requires_affinity());
    }

    #[test]
    fn enqueue_validate_rejects_missing_affinity() {
        let req = EnqueueRequest {
            tenant_id: "t1".into(),
            source_id: Some("s1".into()),
            job_type: JobType::DeleteSnapshot,
            payload: JobPayload::DeleteSnapshot { snapshot_id: "sn1".into() },
            priority: None,
            target_worker_id: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn enqueue_validate_accepts_backup_without_target() {
        let req = EnqueueRequest {
            tenant_id: "t1".into(),
            source_id: Some("s1".into()),
            job_type: JobType::Backup,
            payload: JobPayload::Backup {
                source_id: "s1".into(),
                credential_id: "c1".into(),
                source_config: serde_json::json!({}),
                source_type: crate::model::source::SourceType::Ssh,
            },
            priority: None,
            target_worker_id: None,
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.resolved_priority(), PRIORITY_DEFAULT);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }
}
