//! SQLite plumbing shared by the note and session stores.
//!
//! Connections come from an r2d2 pool; every connection gets a busy timeout
//! so a contended write fails after the configured wait instead of hanging.

pub mod pool;

pub use pool::{open_pool, DbPool, PooledConn};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;

/// Format a timestamp for storage.
///
/// Fixed-width UTC with microseconds, so string order matches time order
/// and range filters can compare the TEXT columns directly.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Parse a stored timestamp column, reporting failures as a column
/// conversion error.
pub fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
