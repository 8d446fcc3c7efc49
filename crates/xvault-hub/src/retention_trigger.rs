//! Debounced retention evaluation, triggered after every completed backup
//! and available on demand via the admin API.
//!
//! The cooldown lock is a process-local `SETNX`-with-TTL equivalent: a
//! `HashMap<source_id, Instant>` behind a `Mutex`. Spec.md §5 allows any
//! distributed KV with the same primitive; this crate runs the Hub with
//! Postgres as the only shared store, and a single `source_id`'s retention
//! firing twice within the cooldown window is a correctness no-op (the
//! second evaluation recomputes the same `{keep, delete}` set), so a
//! process-local lock is sufficient unless the Hub runs with replicas and a
//! tighter guarantee is needed (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use xvault_core::model::job::{EnqueueRequest, JobPayload, JobType, PRIORITY_HIGH};
use xvault_core::retention;
use xvault_storage::repo::{JobStore, ScheduleStore, SnapshotRegistry};

/// Keyed debounce lock: a source already in the map with a fresh timestamp
/// is "in progress" and new triggers for it are skipped.
pub struct RetentionTrigger {
    schedules: ScheduleStore,
    snapshots: SnapshotRegistry,
    jobs: JobStore,
    cooldown: Duration,
    locks: Mutex<HashMap<String, Instant>>,
}

impl RetentionTrigger {
    #[must_use]
    pub fn new(schedules: ScheduleStore, snapshots: SnapshotRegistry, jobs: JobStore, cooldown_secs: u64) -> Arc<Self> {
        Arc::new(Self {
            schedules,
            snapshots,
            jobs,
            cooldown: Duration::from_secs(cooldown_secs),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Evaluate retention for `source_id` if no evaluation is currently in
    /// its cooldown window, enqueueing a `delete_snapshot` job for every
    /// snapshot the policy marks for deletion.
    pub async fn trigger(&self, source_id: &str) {
        if !self.try_acquire(source_id).await {
            info!(source_id, "retention trigger debounced; evaluation already in cooldown");
            return;
        }

        let Ok(Some(schedule)) = self.schedules.get_for_source(source_id).await else {
            // No schedule (and therefore no retention_policy) for this
            // source, nothing to evaluate.
            return;
        };

        let refs = match self.snapshots.retention_refs_for_source(source_id).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!(source_id, error = %e, "failed to load snapshot history for retention");
                return;
            }
        };

        let result = retention::evaluate(&schedule.retention_policy, &refs);
        info!(source_id, summary = %result.summary(), "retention evaluated");

        for snapshot in result.delete {
            let Some(worker_id) = snapshot.worker_id else {
                warn!(source_id, snapshot_id = %snapshot.id, "retention delete target has no worker affinity; skipping");
                continue;
            };

            let enqueue = EnqueueRequest {
                tenant_id: schedule.tenant_id.clone(),
                source_id: Some(source_id.to_owned()),
                job_type: JobType::DeleteSnapshot,
                payload: JobPayload::DeleteSnapshot { snapshot_id: snapshot.id.clone() },
                priority: Some(PRIORITY_HIGH),
                target_worker_id: Some(worker_id),
            };

            if let Err(e) = self.jobs.enqueue(enqueue).await {
                warn!(source_id, snapshot_id = %snapshot.id, error = %e, "failed to enqueue retention delete job");
            }
        }
    }

    async fn try_acquire(&self, source_id: &str) -> bool {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();
        locks.retain(|_, acquired_at| now.duration_since(*acquired_at) < self.cooldown);
        if locks.contains_key(source_id) {
            return false;
        }
        locks.insert(source_id.to_owned(), now);
        true
    }
}

