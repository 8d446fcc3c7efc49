//! Postgres-backed repositories for xVault's metadata store.
//!
//! Mirrors the entities in the domain model one-for-one: each repository
//! owns exactly one table and speaks `xvault-core` types in and out. There
//! is no separate migration runner, each repository bootstraps its own
//! table with `CREATE TABLE IF NOT EXISTS` on first connect, the same way
//! the rest of this lineage does it.

pub mod error;
pub mod pool;
pub mod repo;

pub use error::StoreError;
pub use pool::connect_pool;
pub use sqlx::PgPool;
