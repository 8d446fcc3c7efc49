//! Converts due schedule rows into scheduled backup job enqueues.
//!
//! Safe across Hub replicas: `record_fire` is a conditional `UPDATE ...
//! WHERE next_run_at = $previous`, so when two replicas race on the same
//! due row only one of them advances `next_run_at` and claims the fire.
//! The loser's `record_fire` affects zero rows and it skips the enqueue
//! entirely, exactly one job is produced per fire regardless of replica
//! count.

use std::sync::Arc;
use tracing::{error, info, warn};

use xvault_core::model::job::{EnqueueRequest, JobPayload, JobType, PRIORITY_DEFAULT};
use xvault_core::model::source::SourceStatus;
use xvault_core::schedule_calc;
use xvault_storage::repo::{JobStore, ScheduleStore, SourceStore};

use crate::queue::QueueSignal;

pub struct ScheduleEngine {
    schedules: ScheduleStore,
    sources: SourceStore,
    jobs: JobStore,
    queue: QueueSignal,
}

impl ScheduleEngine {
    #[must_use]
    pub fn new(schedules: ScheduleStore, sources: SourceStore, jobs: JobStore, queue: QueueSignal) -> Self {
        Self { schedules, sources, jobs, queue }
    }

    /// Run one tick: enqueue a backup job for every due, enabled schedule
    /// whose source is active, then advance `next_run_at`.
    pub async fn tick(&self) {
        let now = chrono::Utc::now();
        let due = match self.schedules.due(now).await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "failed to load due schedules");
                return;
            }
        };

        for schedule in due {
            let source = match self.sources.get(&schedule.source_id).await {
                Ok(source) => source,
                Err(e) => {
                    warn!(schedule_id = %schedule.id, source_id = %schedule.source_id, error = %e, "schedule references missing source");
                    continue;
                }
            };

            // Disabling a source suppresses enqueues but does not clear
            // next_run_at, re-enabling resumes normal ticks.
            if source.status != SourceStatus::Active {
                continue;
            }

            let next_run_at = match schedule_calc::next_run_after(&schedule, now) {
                Ok(next_run_at) => next_run_at,
                Err(e) => {
                    // Invalid cron leaves next_run_at unchanged, a config
                    // bug, not something the engine recovers from silently.
                    error!(schedule_id = %schedule.id, error = %e, "schedule has an invalid trigger; next_run_at left unchanged");
                    continue;
                }
            };

            // Claim the fire before enqueuing: whichever replica wins this
            // conditional update is the only one that enqueues a job for it.
            let won = match self.schedules.record_fire(&schedule.id, schedule.next_run_at, now, next_run_at).await {
                Ok(won) => won,
                Err(e) => {
                    error!(schedule_id = %schedule.id, error = %e, "failed to record schedule fire");
                    continue;
                }
            };
            if !won {
                continue;
            }

            let payload = JobPayload::Backup {
                source_id: source.id.clone(),
                credential_id: source.credential_id.clone(),
                source_config: source.config.clone(),
                source_type: source.source_type,
            };

            let enqueue = EnqueueRequest {
                tenant_id: schedule.tenant_id.clone(),
                source_id: Some(source.id.clone()),
                job_type: JobType::Backup,
                payload,
                priority: Some(PRIORITY_DEFAULT),
                target_worker_id: None,
            };

            match self.jobs.enqueue(enqueue).await {
                Ok(job_id) => {
                    info!(schedule_id = %schedule.id, source_id = %source.id, job_id, "schedule fired");
                    self.queue.wake();
                }
                Err(e) => {
                    error!(schedule_id = %schedule.id, error = %e, "failed to enqueue scheduled backup");
                }
            }
        }
    }

    /// Run the tick loop forever at `interval_secs` cadence until `shutdown`
    /// fires.
    pub async fn run(self: Arc<Self>, interval_secs: u64, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        info!(interval_secs, "schedule engine started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("schedule engine shutting down");
                    return;
                }
            }
        }
    }
}
