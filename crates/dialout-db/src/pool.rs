//! SQLite connection pooling.
//!
//! Webhook turns for one call can land concurrently, so every pooled
//! connection opens with the full mutex, WAL journaling, and a busy
//! timeout: writers queue on the database lock instead of failing with
//! `SQLITE_BUSY` mid-turn.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// The pooled SQLite handle shared across the server.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors from pool construction.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool could not be built (bad path, exhausted handles).
    #[error("database pool unavailable: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens a pool over `db_path`, applying the connection pragmas to every
/// handle as it is created. `:memory:` is accepted for tests, with the
/// caveat that each pooled in-memory connection is its own database.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` when the pool cannot be built.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| apply_pragmas(conn, settings.busy_timeout_ms));

    Ok(Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?)
}

fn apply_pragmas(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    // journal_mode reports the mode actually in effect; in-memory databases
    // answer "memory", which is fine for tests.
    let mode = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    })?;
    if mode != "wal" && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode stuck at '{mode}'")),
        ));
    }

    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", busy_timeout_ms)?;
    Ok(())
}
