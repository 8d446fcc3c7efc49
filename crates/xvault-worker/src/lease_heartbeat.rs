//! LeaseHeartbeat (spec.md §4.4): renews a running job's lease at
//! `LEASE_HEARTBEAT_SECS` cadence. Three consecutive renewal failures
//! trigger local failure, the pipeline's cancellation token is tripped so
//! every in-flight stage aborts and cleans up rather than racing a lease
//! the Hub may have already reclaimed.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use xvault_core::model::job::LEASE_HEARTBEAT_SECS;

use crate::hub_client::HubClient;

const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Runs until `stop` fires (pipeline finished on its own) or three renewals
/// in a row fail, in which case `job_cancel` is tripped before returning.
pub async fn run(job_id: &str, hub: &HubClient, job_cancel: &CancellationToken, stop: &CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(LEASE_HEARTBEAT_SECS as u64));
    interval.tick().await; // first tick fires immediately; the lease is already fresh from claim.

    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            () = stop.cancelled() => return,
            () = job_cancel.cancelled() => return,
            _ = interval.tick() => {
                match hub.renew_lease(job_id).await {
                    Ok(expires_at) => {
                        consecutive_failures = 0;
                        tracing::debug!(job_id, %expires_at, "lease renewed");
                    }
                    Err(err) => {
                        consecutive_failures += 1;
                        warn!(job_id, %err, consecutive_failures, "lease renewal failed");
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            error!(job_id, "lease lost after {MAX_CONSECUTIVE_FAILURES} consecutive renewal failures; canceling pipeline");
                            job_cancel.cancel();
                            return;
                        }
                    }
                }
            }
        }
    }
}
