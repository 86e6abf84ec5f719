//! Database layer for nexcall.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. The `calls` and `call_conversations` tables
//! are created through versioned migrations managed by this crate.
//!
//! SQLite keeps the call-record store in-process; WAL mode lets the CRUD
//! surface read while the webhook handler writes.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
