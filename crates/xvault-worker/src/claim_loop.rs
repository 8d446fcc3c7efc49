//! ClaimLoop (spec.md §4.4):
//!
//! ```text
//! IDLE ──wakeup──▶ CLAIM_REQUEST ──NoJob──▶ BACKOFF ──▶ IDLE
//!                       │
//!                    Job found
//!                       ▼
//!                   EXECUTING ──▶ REPORT_DONE / REPORT_FAIL
//! ```
//!
//! The worker has no direct subscriber to the Hub's internal queue signal
//! (that channel is process-internal to the Hub, see `xvault_hub::queue`);
//! the periodic poll is this worker's only wakeup source, which is an
//! explicitly allowed fallback when a wakeup signal is lost (spec.md §6).
//! `BACKOFF` collapses into the next poll tick rather than a distinct state.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use xvault_core::crypto::Kek;
use xvault_core::model::job::{Job, JobStatus};

use crate::hub_client::HubClient;
use crate::lease_heartbeat;
use crate::local_store::LocalStore;
use crate::pipeline;

pub struct ClaimLoop {
    hub: Arc<HubClient>,
    store: Arc<LocalStore>,
    kek: Kek,
    worker_id: String,
    max_concurrency: usize,
    poll_interval_secs: u64,
    allow_insecure_host_keys: bool,
}

impl ClaimLoop {
    #[must_use]
    pub fn new(
        hub: Arc<HubClient>,
        store: Arc<LocalStore>,
        kek: Kek,
        worker_id: String,
        max_concurrency: usize,
        poll_interval_secs: u64,
        allow_insecure_host_keys: bool,
    ) -> Self {
        Self { hub, store, kek, worker_id, max_concurrency, poll_interval_secs, allow_insecure_host_keys }
    }

    /// Runs until `shutdown` reports `true`. Stops issuing new claims
    /// immediately on shutdown but does not itself wait for in-flight jobs
    ///, `main` holds the join handles for that (spec.md §5 grace period).
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.poll_interval_secs));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut in_flight = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.fill_capacity(&semaphore, &mut in_flight).await;
                }
            }
        }

        info!(pending = in_flight.len(), "claim loop stopped; waiting for in-flight jobs");
        for handle in in_flight {
            let _ = handle.await;
        }
    }

    /// Claim jobs until either a `NoJob` response or the concurrency cap is
    /// reached, spawning one task per claimed job.
    async fn fill_capacity(&self, semaphore: &Arc<Semaphore>, in_flight: &mut Vec<tokio::task::JoinHandle<()>>) {
        in_flight.retain(|h| !h.is_finished());

        loop {
            let Ok(permit) = Arc::clone(semaphore).try_acquire_owned() else { break };

            match self.hub.claim().await {
                Ok(Some(job)) => {
                    let runner = self.job_runner(job);
                    in_flight.push(tokio::spawn(async move {
                        runner.await;
                        drop(permit);
                    }));
                }
                Ok(None) => {
                    drop(permit);
                    break;
                }
                Err(err) => {
                    warn!(%err, "claim request failed");
                    drop(permit);
                    break;
                }
            }
        }
    }

    fn job_runner(&self, job: Job) -> impl std::future::Future<Output = ()> + Send + 'static {
        let hub = Arc::clone(&self.hub);
        let store = Arc::clone(&self.store);
        let kek = self.kek.clone();
        let worker_id = self.worker_id.clone();
        let allow_insecure_host_keys = self.allow_insecure_host_keys;

        async move {
            let job_cancel = CancellationToken::new();
            let stop = CancellationToken::new();

            let heartbeat_handle = {
                let hub = Arc::clone(&hub);
                let job_id = job.id.clone();
                let job_cancel = job_cancel.clone();
                let stop = stop.clone();
                tokio::spawn(async move {
                    lease_heartbeat::run(&job_id, &hub, &job_cancel, &stop).await;
                })
            };

            let outcome = pipeline::run(&job, &worker_id, &store, &hub, &kek, allow_insecure_host_keys, &job_cancel).await;

            stop.cancel();
            let _ = heartbeat_handle.await;

            let (status, error_code, error_message, snapshot) =
                (outcome.status, outcome.error_code, outcome.error_message, outcome.snapshot);

            if status == JobStatus::Failed && error_code == Some(xvault_core::error::ErrorKind::LeaseLost) {
                // The Hub already returned this job to `queued` on lease
                // expiry; reporting completion would race that reclaim.
                warn!(job_id = %job.id, "skipping completion report for a job whose lease was lost");
                return;
            }

            if let Err(err) = hub.complete(&job.id, status, error_code, error_message, snapshot).await {
                warn!(job_id = %job.id, %err, "failed to report job completion to hub");
            }
        }
    }
}
