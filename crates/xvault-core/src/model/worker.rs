//! Worker registry domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Worker process lifecycle status, reported via heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Offline,
    Draining,
}

/// A registered worker process. `id` is stable across restarts (the
/// operator assigns `WORKER_ID`; the Hub never generates it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub name: String,
    pub status: WorkerStatus,
    pub capabilities: Vec<String>,
    pub storage_base_path: String,
    pub last_seen_at: DateTime<Utc>,
    pub system_metrics: Option<serde_json::Value>,
}
