//! Shared domain types, error taxonomy, and pure orchestration logic for
//! xVault's Hub and Worker.
//!
//! This crate has no I/O: storage access lives in `xvault-storage`, HTTP and
//! scheduling plumbing in `xvault-hub`, and connector/packaging execution in
//! `xvault-worker`. Keeping the retention and schedule math here means both
//! the Hub (tick loop) and tests can call it without a database.

pub mod crypto;
pub mod error;
pub mod ids;
pub mod model;
pub mod retention;
pub mod schedule_calc;
