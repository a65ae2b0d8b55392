//! Notes and session backend for a personal assistant agent.
//!
//! The note store keeps notes in SQLite with an FTS5 index; the session
//! store keeps per-user conversation state. Both are synchronous and are
//! shared behind `Arc`; the async tool layer moves calls onto blocking
//! threads.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notes;
pub mod sessions;
pub mod tools;

use std::sync::Arc;

use config::Config;
use error::StoreResult;
use notes::NoteStore;
use sessions::{SessionMetrics, SessionStore, TurnTracker};
use tools::{ToolContext, ToolRegistry};

pub struct AppState {
    pub config: Config,
    pub notes: Arc<NoteStore>,
    pub sessions: Arc<SessionStore>,
    pub metrics: Arc<SessionMetrics>,
    pub tracker: TurnTracker,
    pub tool_registry: Arc<ToolRegistry>,
}

impl AppState {
    /// Open both databases and register the built-in tools.
    pub fn from_config(config: Config) -> StoreResult<Self> {
        let notes = Arc::new(NoteStore::open(&config.notes)?);
        let sessions = Arc::new(SessionStore::open(&config.sessions)?);
        let metrics = Arc::new(SessionMetrics::new(Arc::clone(&sessions)));
        let tracker = TurnTracker::new(Arc::clone(&sessions), Arc::clone(&metrics));
        let tool_registry = Arc::new(tools::create_default_registry());

        log::info!("Registered {} tools", tool_registry.len());

        Ok(Self {
            config,
            notes,
            sessions,
            metrics,
            tracker,
            tool_registry,
        })
    }

    /// Tool context for one (user, session) turn.
    pub fn tool_context(&self, user_id: &str, session_id: &str) -> ToolContext {
        ToolContext::new()
            .with_notes_store(Arc::clone(&self.notes))
            .with_session(user_id, session_id)
    }
}
