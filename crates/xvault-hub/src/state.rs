//! Shared application state, injected into every Axum handler.

use std::sync::Arc;

use xvault_storage::repo::{CredentialStore, JobStore, ScheduleStore, SnapshotRegistry, SourceStore, TenantStore, WorkerRegistry};

use crate::credential_vault::CredentialVault;
use crate::queue::QueueSignal;
use crate::retention_trigger::RetentionTrigger;

/// Everything a route handler needs. Cheap to clone, every field is
/// already an `Arc` or a `Clone`-cheap pool-backed repository.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobStore,
    pub schedules: ScheduleStore,
    pub snapshots: SnapshotRegistry,
    pub sources: SourceStore,
    pub tenants: TenantStore,
    pub workers: WorkerRegistry,
    pub credentials: CredentialStore,
    pub vault: CredentialVault,
    pub queue: QueueSignal,
    pub retention: Arc<RetentionTrigger>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
