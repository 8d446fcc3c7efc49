//! The xVault Hub: the stateless metadata and orchestration half of the
//! split architecture. Holds no backup bytes, those live on a Worker's
//! local disk, addressed by `target_worker_id` affinity.

pub mod config;
pub mod credential_vault;
pub mod error;
pub mod hardening;
pub mod queue;
pub mod retention_trigger;
pub mod routes;
pub mod schedule_engine;
pub mod state;
