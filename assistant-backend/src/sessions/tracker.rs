use std::sync::Arc;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{SessionMetrics, SessionStore};
use crate::error::StoreResult;
use crate::models::SessionRecord;

/// Session bookkeeping for one chat turn: resolve the session, bump its
/// `message_count` and record the message in metrics.
pub struct TurnTracker {
    sessions: Arc<SessionStore>,
    metrics: Arc<SessionMetrics>,
}

impl TurnTracker {
    pub fn new(sessions: Arc<SessionStore>, metrics: Arc<SessionMetrics>) -> Self {
        Self { sessions, metrics }
    }

    /// Start a turn, creating the session when it does not exist yet.
    /// Without a `session_id` a fresh UUID is used.
    pub fn begin_turn(&self, user_id: &str, session_id: Option<&str>) -> StoreResult<SessionRecord> {
        let session_id = match session_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        let (record, created) = self.sessions.modify_or_create(
            user_id,
            &session_id,
            first_turn_state,
            increment_message_count,
        )?;
        if created {
            log::info!("[SESSIONS] New session {} for user {}", session_id, user_id);
        }

        self.metrics.record(user_id, &session_id);
        Ok(record)
    }
}

fn first_turn_state() -> Map<String, Value> {
    let mut state = Map::new();
    state.insert("message_count".to_string(), json!(1));
    state
}

fn increment_message_count(state: &mut Map<String, Value>) {
    let count = state.get("message_count").and_then(Value::as_i64).unwrap_or(0);
    state.insert("message_count".to_string(), json!(count + 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use tempfile::{tempdir, TempDir};

    fn tracker() -> (TempDir, TurnTracker, Arc<SessionMetrics>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let config = SessionConfig::at(path.to_str().unwrap()).unwrap();
        let sessions = Arc::new(SessionStore::open(&config).unwrap());
        let metrics = Arc::new(SessionMetrics::new(Arc::clone(&sessions)));
        let tracker = TurnTracker::new(sessions, Arc::clone(&metrics));
        (dir, tracker, metrics)
    }

    #[test]
    fn test_turns_accumulate() {
        let (_dir, tracker, metrics) = tracker();

        let first = tracker.begin_turn("u1", Some("chat")).unwrap();
        assert_eq!(first.message_count(), 1);

        let second = tracker.begin_turn("u1", Some("chat")).unwrap();
        assert_eq!(second.message_count(), 2);
        assert_eq!(second.created_at(), first.created_at());

        assert_eq!(metrics.message_count("u1", "chat"), 2);
        assert_eq!(metrics.basic_stats().unwrap().total_sessions, 1);
    }

    #[test]
    fn test_missing_session_id_generates_one() {
        let (_dir, tracker, _metrics) = tracker();

        let a = tracker.begin_turn("u1", None).unwrap();
        let b = tracker.begin_turn("u1", Some("  ")).unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert!(Uuid::parse_str(&a.session_id).is_ok());
    }

    #[test]
    fn test_concurrent_first_turns_keep_every_message() {
        let (_dir, tracker, metrics) = tracker();
        let tracker = Arc::new(tracker);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.begin_turn("u1", Some("new-chat")).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let last = tracker.begin_turn("u1", Some("new-chat")).unwrap();
        assert_eq!(last.message_count(), 7);
        assert_eq!(metrics.message_count("u1", "new-chat"), 7);
    }
}
