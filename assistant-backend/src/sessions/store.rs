//! SessionStore: per-user session state persisted as JSON
//!
//! One row per `(user_id, session_id)`. The `data` column holds the whole
//! state object; `created_at`/`updated_at` columns mirror it so activity
//! can be counted without decoding JSON.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use crate::config::SessionConfig;
use crate::db::{now_timestamp, open_pool, timestamp, DbPool};
use crate::error::{StoreError, StoreResult};
use crate::models::{SessionRecord, RESERVED_SESSION_KEYS};

pub struct SessionStore {
    pool: DbPool,
    /// Held across every read-modify-write so concurrent merges can't lose updates
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn open(config: &SessionConfig) -> StoreResult<Self> {
        let pool = open_pool(&config.db_path, config.busy_timeout)?;
        {
            let conn = pool.get()?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    user_id TEXT NOT NULL,
                    session_id TEXT NOT NULL,
                    data TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, session_id)
                );
                CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);",
            )?;
        }

        log::info!("[SESSIONS] Session store ready at {}", config.db_path);
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    /// Create or fully replace a session.
    ///
    /// Reserved keys in `initial_state` are ignored; the store stamps them.
    pub fn create(
        &self,
        user_id: &str,
        session_id: &str,
        initial_state: Map<String, Value>,
    ) -> StoreResult<SessionRecord> {
        validate_key(user_id, session_id)?;
        let _guard = self.write_lock.lock();
        let conn = self.pool.get()?;
        write_new(&conn, user_id, session_id, initial_state)
    }

    /// Fetch a session, refreshing its `last_activity`.
    pub fn get(&self, user_id: &str, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        self.modify(user_id, session_id, |_| {})
    }

    /// Shallow-merge `patch` into an existing session. Returns `None` when
    /// the session does not exist; it is never created here.
    pub fn update(
        &self,
        user_id: &str,
        session_id: &str,
        patch: Map<String, Value>,
    ) -> StoreResult<Option<SessionRecord>> {
        self.modify(user_id, session_id, move |state| {
            for (key, value) in patch {
                if RESERVED_SESSION_KEYS.contains(&key.as_str()) {
                    log::debug!("[SESSIONS] Ignoring reserved key {:?} in update", key);
                    continue;
                }
                state.insert(key, value);
            }
        })
    }

    /// Like [`get`](Self::get) but fails with `SessionNotFound` on a miss.
    pub fn require(&self, user_id: &str, session_id: &str) -> StoreResult<SessionRecord> {
        self.get(user_id, session_id)?
            .ok_or_else(|| StoreError::SessionNotFound {
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
            })
    }

    /// Read-modify-write a session's state under the store lock.
    ///
    /// `f` runs on the decoded state; store-owned keys are re-stamped
    /// afterwards and `last_activity` is refreshed.
    pub fn modify<F>(&self, user_id: &str, session_id: &str, f: F) -> StoreResult<Option<SessionRecord>>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        validate_key(user_id, session_id)?;
        let _guard = self.write_lock.lock();
        let conn = self.pool.get()?;

        let Some((mut state, created_at)) = load(&conn, user_id, session_id)? else {
            return Ok(None);
        };

        f(&mut state);
        write_existing(&conn, user_id, session_id, state, created_at).map(Some)
    }

    /// Apply `f` to an existing session, or create it from `init` when it
    /// is missing. Both paths run under one hold of the store lock, so
    /// concurrent callers on a new session never overwrite each other.
    ///
    /// The flag is `true` when the session was created.
    pub fn modify_or_create<I, F>(
        &self,
        user_id: &str,
        session_id: &str,
        init: I,
        f: F,
    ) -> StoreResult<(SessionRecord, bool)>
    where
        I: FnOnce() -> Map<String, Value>,
        F: FnOnce(&mut Map<String, Value>),
    {
        validate_key(user_id, session_id)?;
        let _guard = self.write_lock.lock();
        let conn = self.pool.get()?;

        match load(&conn, user_id, session_id)? {
            Some((mut state, created_at)) => {
                f(&mut state);
                let record = write_existing(&conn, user_id, session_id, state, created_at)?;
                Ok((record, false))
            }
            None => {
                let record = write_new(&conn, user_id, session_id, init())?;
                Ok((record, true))
            }
        }
    }

    pub fn count_sessions(&self) -> StoreResult<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Sessions touched at or after `cutoff`.
    pub fn count_active_since(&self, cutoff: DateTime<Utc>) -> StoreResult<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE updated_at >= ?1",
            params![timestamp(cutoff)],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn validate_key(user_id: &str, session_id: &str) -> StoreResult<()> {
    if user_id.trim().is_empty() {
        return Err(StoreError::validation("user_id cannot be empty"));
    }
    if session_id.trim().is_empty() {
        return Err(StoreError::validation("session_id cannot be empty"));
    }
    Ok(())
}

fn stamp(state: &mut Map<String, Value>, user_id: &str, session_id: &str) {
    state.insert("user_id".to_string(), Value::String(user_id.to_string()));
    state.insert("session_id".to_string(), Value::String(session_id.to_string()));
}

/// Insert or replace a session row with fresh timestamps. Caller holds the lock.
fn write_new(
    conn: &Connection,
    user_id: &str,
    session_id: &str,
    initial_state: Map<String, Value>,
) -> StoreResult<SessionRecord> {
    let now = now_timestamp();
    let mut state = initial_state;
    stamp(&mut state, user_id, session_id);
    state.insert("created_at".to_string(), Value::String(now.clone()));
    state.insert("last_activity".to_string(), Value::String(now.clone()));

    conn.execute(
        "INSERT INTO sessions (user_id, session_id, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(user_id, session_id) DO UPDATE SET
            data = excluded.data,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at",
        params![user_id, session_id, serde_json::to_string(&state)?, now],
    )?;

    log::info!("[SESSIONS] Created session {} for user {}", session_id, user_id);
    Ok(SessionRecord {
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
        state,
    })
}

/// Re-stamp store-owned keys and write an existing session back.
fn write_existing(
    conn: &Connection,
    user_id: &str,
    session_id: &str,
    mut state: Map<String, Value>,
    created_at: String,
) -> StoreResult<SessionRecord> {
    let now = now_timestamp();
    stamp(&mut state, user_id, session_id);
    state.insert("created_at".to_string(), Value::String(created_at));
    state.insert("last_activity".to_string(), Value::String(now.clone()));

    conn.execute(
        "UPDATE sessions SET data = ?1, updated_at = ?2 WHERE user_id = ?3 AND session_id = ?4",
        params![serde_json::to_string(&state)?, now, user_id, session_id],
    )?;

    Ok(SessionRecord {
        user_id: user_id.to_string(),
        session_id: session_id.to_string(),
        state,
    })
}

/// Decoded state plus the row's `created_at`.
fn load(
    conn: &Connection,
    user_id: &str,
    session_id: &str,
) -> StoreResult<Option<(Map<String, Value>, String)>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT data, created_at FROM sessions WHERE user_id = ?1 AND session_id = ?2",
            params![user_id, session_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((data, created_at)) => {
            let state = match serde_json::from_str::<Value>(&data)? {
                Value::Object(map) => map,
                other => {
                    return Err(StoreError::Storage(format!(
                        "session {}/{} holds non-object data: {}",
                        user_id, session_id, other
                    )))
                }
            };
            Ok(Some((state, created_at)))
        }
        None => Ok(None),
    }
}
