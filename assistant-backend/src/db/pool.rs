use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::ensure_parent_dir;
use crate::error::{StoreError, StoreResult};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// One writer plus readers; WAL lets the readers proceed during a write.
const POOL_SIZE: u32 = 8;

/// Applies the busy timeout and per-connection pragmas on every checkout.
#[derive(Debug)]
struct ConnectionCustomizer {
    busy_timeout: Duration,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA synchronous=NORMAL;")?;
        Ok(())
    }
}

/// Open a pooled SQLite database at `db_path` in WAL mode.
pub fn open_pool(db_path: &str, busy_timeout: Duration) -> StoreResult<DbPool> {
    ensure_parent_dir(db_path)
        .map_err(|e| StoreError::Storage(format!("Failed to create directory for {}: {}", db_path, e)))?;

    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .connection_timeout(busy_timeout)
        .connection_customizer(Box::new(ConnectionCustomizer { busy_timeout }))
        .build(manager)?;

    // journal_mode is persistent for the file, so once is enough
    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    Ok(pool)
}
