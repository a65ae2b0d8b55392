use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::SessionStore;
use crate::error::StoreResult;
use crate::models::BasicStats;

/// A session counts as active if it was touched within this window.
const ACTIVE_WINDOW_HOURS: i64 = 1;

/// Lightweight usage counters.
///
/// Session totals are read from the session table on every call, while
/// message counts live only in memory and restart at zero with the process.
pub struct SessionMetrics {
    sessions: Arc<SessionStore>,
    message_counts: Mutex<HashMap<(String, String), u64>>,
}

impl SessionMetrics {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self {
            sessions,
            message_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Count one message for the session.
    pub fn record(&self, user_id: &str, session_id: &str) {
        let mut counts = self.message_counts.lock();
        *counts
            .entry((user_id.to_string(), session_id.to_string()))
            .or_insert(0) += 1;
    }

    pub fn message_count(&self, user_id: &str, session_id: &str) -> u64 {
        self.message_counts
            .lock()
            .get(&(user_id.to_string(), session_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn basic_stats(&self) -> StoreResult<BasicStats> {
        self.basic_stats_at(Utc::now())
    }

    pub fn basic_stats_at(&self, now: DateTime<Utc>) -> StoreResult<BasicStats> {
        let total_sessions = self.sessions.count_sessions()?;
        let active_sessions = self
            .sessions
            .count_active_since(now - Duration::hours(ACTIVE_WINDOW_HOURS))?;
        let total_messages: u64 = self.message_counts.lock().values().sum();

        log::debug!(
            "[METRICS] sessions={} active={} messages={}",
            total_sessions,
            active_sessions,
            total_messages
        );

        Ok(BasicStats {
            total_sessions,
            active_sessions,
            total_messages,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use serde_json::Map;
    use tempfile::tempdir;

    #[test]
    fn test_stats_mix_durable_and_volatile_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let config = SessionConfig::at(path.to_str().unwrap()).unwrap();
        let store = Arc::new(SessionStore::open(&config).unwrap());

        store.create("u1", "s1", Map::new()).unwrap();
        store.create("u2", "s1", Map::new()).unwrap();

        let metrics = SessionMetrics::new(Arc::clone(&store));
        metrics.record("u1", "s1");
        metrics.record("u1", "s1");
        metrics.record("u2", "s1");

        let stats = metrics.basic_stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(metrics.message_count("u1", "s1"), 2);
        assert_eq!(metrics.message_count("u3", "s1"), 0);

        // A fresh metrics instance keeps the durable counts only
        let restarted = SessionMetrics::new(store);
        let stats = restarted.basic_stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_messages, 0);
    }

    #[test]
    fn test_active_window() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let config = SessionConfig::at(path.to_str().unwrap()).unwrap();
        let store = Arc::new(SessionStore::open(&config).unwrap());
        store.create("u1", "s1", Map::new()).unwrap();

        let metrics = SessionMetrics::new(store);
        let later = Utc::now() + Duration::hours(2);
        let stats = metrics.basic_stats_at(later).unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.timestamp, later);
    }
}
