//! Database layer for the Dialout platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. The call session and interaction tables are
//! created exclusively through versioned migrations managed here.
//!
//! SQLite in WAL mode fits the access pattern: many concurrent webhook
//! readers, one writer at a time, no external database process. Migrations
//! are compiled into the binary via `include_str!` so they cannot drift from
//! the code that depends on them.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
