//! The xVault Worker: claims jobs from the Hub, pulls remote sources over
//! SSH/SFTP, packages encrypted snapshots, and writes them to its own
//! local disk. Worker filesystem state is owned by exactly one process,
//! no cross-worker sharing (spec.md §5).

pub mod claim_loop;
pub mod config;
pub mod connectors;
pub mod error;
pub mod hardening;
pub mod hub_client;
pub mod lease_heartbeat;
pub mod local_store;
pub mod packager;
pub mod pipeline;
