//! One repository per entity in the domain model.

pub mod credential;
pub mod job;
pub mod schedule;
pub mod snapshot;
pub mod source;
pub mod tenant;
pub mod worker;

pub use credential::CredentialStore;
pub use job::JobStore;
pub use schedule::ScheduleStore;
pub use snapshot::SnapshotRegistry;
pub use source::SourceStore;
pub use tenant::TenantStore;
pub use worker::WorkerRegistry;
