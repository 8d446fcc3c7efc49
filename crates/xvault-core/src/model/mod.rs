//! Domain model: the storage-agnostic shapes shared by `xvault-storage`,
//! `xvault-hub`, and `xvault-worker`.

pub mod credential;
pub mod job;
pub mod retention;
pub mod schedule;
pub mod snapshot;
pub mod source;
pub mod tenant;
pub mod worker;
