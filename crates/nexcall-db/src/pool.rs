//! Pooled connections to the call-record database file.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Per-connection tunables, taken from the server's `[database]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    pub busy_timeout_ms: u64,
    pub pool_max_size: u32,
}

#[derive(Debug, Error)]
pub enum PoolError {
    /// The webhook path and the call API share one store, so it must be a file.
    #[error("database path must name a file, got {0:?}")]
    NotAFile(String),

    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens a pool over the database file at `db_path`.
///
/// Every connection runs in WAL mode so the call API can read while the
/// webhook path writes, with foreign keys enforced between calls and their
/// transcript entries.
///
/// # Errors
///
/// `PoolError::NotAFile` for an empty or in-memory path, `PoolError::PoolInit`
/// when no connection can be opened or WAL cannot be enabled.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    if is_transient(db_path) {
        return Err(PoolError::NotAFile(db_path.to_string()));
    }

    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(move |conn| prepare_connection(conn, busy_timeout));

    Ok(Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?)
}

fn is_transient(db_path: &str) -> bool {
    let path = db_path.trim();
    path.is_empty() || path == ":memory:" || path.starts_with("file::memory:")
}

fn prepare_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;

    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            Some(format!("call store needs WAL, journal_mode is {mode}")),
        ));
    }

    conn.pragma_update(None, "foreign_keys", true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: DbRuntimeSettings = DbRuntimeSettings {
        busy_timeout_ms: 1_500,
        pool_max_size: 3,
    };

    fn pragma(conn: &Connection, name: &str) -> String {
        conn.query_row(&format!("PRAGMA {name};"), [], |row| {
            row.get::<_, rusqlite::types::Value>(0)
        })
        .map(|v| match v {
            rusqlite::types::Value::Integer(n) => n.to_string(),
            rusqlite::types::Value::Text(t) => t,
            other => format!("{other:?}"),
        })
        .unwrap()
    }

    #[test]
    fn file_connections_use_wal_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.db");
        let pool = create_pool(path.to_str().unwrap(), SETTINGS).unwrap();
        assert_eq!(pool.max_size(), 3);

        let conn = pool.get().unwrap();
        assert_eq!(pragma(&conn, "journal_mode"), "wal");
        assert_eq!(pragma(&conn, "foreign_keys"), "1");
        assert_eq!(pragma(&conn, "busy_timeout"), "1500");
    }

    #[test]
    fn in_memory_paths_are_rejected() {
        for path in ["", "  ", ":memory:", "file::memory:?cache=shared"] {
            assert!(
                matches!(create_pool(path, SETTINGS), Err(PoolError::NotAFile(_))),
                "{path:?} should be rejected"
            );
        }
    }
}
