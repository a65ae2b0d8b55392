//! Error types shared by the note and session stores.
//!
//! Storage-engine errors (rusqlite, r2d2, serde_json) are flattened into
//! `StoreError::Storage` so that no engine-specific type crosses a store
//! boundary.

use thiserror::Error;

/// Result alias used by every store operation.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Bad shape, length or range on caller input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Note id does not exist
    #[error("Note {0} not found")]
    NoteNotFound(i64),

    /// No session stored under the composite key
    #[error("Session {session_id} not found for user {user_id}")]
    SessionNotFound { user_id: String, session_id: String },

    /// I/O failure, lock timeout or corrupt data
    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    /// Validation and not-found errors are the caller's to fix; storage
    /// errors are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StoreError::Storage(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Storage(format!("connection pool: {}", e))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Storage(format!("serialization: {}", e))
    }
}
