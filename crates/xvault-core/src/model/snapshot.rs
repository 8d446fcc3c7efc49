//! Snapshot and locator domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a completed (or failed) backup attempt's snapshot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Completed,
    Failed,
}

/// The pointer the Hub stores for a snapshot. Only `local_fs` is required;
/// the shape keeps room for a future S3-style backend without touching
/// callers (Non-goals exclude building that backend now).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "storage_backend", rename_all = "snake_case")]
pub enum Locator {
    LocalFs {
        worker_id: String,
        local_path: String,
    },
    S3 {
        bucket: String,
        object_key: String,
        etag: String,
    },
}

impl Locator {
    /// The worker that must service any future restore/delete for this
    /// snapshot (affinity). `None` for backends with no worker affinity.
    #[must_use]
    pub fn worker_id(&self) -> Option<&str> {
        match self {
            Self::LocalFs { worker_id, .. } => Some(worker_id),
            Self::S3 { .. } => None,
        }
    }
}

/// A completed (or failed) backup's metadata and locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub tenant_id: String,
    pub source_id: String,
    pub job_id: String,
    pub status: SnapshotStatus,
    pub size_bytes: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub manifest: serde_json::Value,
    pub encryption_algorithm: String,
    pub encryption_key_id: String,
    pub locator: Locator,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_fs_locator_exposes_worker_id() {
        let locator = Locator::LocalFs {
            worker_id: "w-1".into(),
            local_path: "/base/tenants/t1/sources/s1/snapshots/sn1".into(),
        };
        assert_eq!(locator.worker_id(), Some("w-1"));
    }

    #[test]
    fn s3_locator_has_no_worker_affinity() {
        let locator = Locator::S3 {
            bucket: "b".into(),
            object_key: "k".into(),
            etag: "e".into(),
        };
        assert_eq!(locator.worker_id(), None);
    }
}
