use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the session store stamps itself; caller values for these are ignored.
pub const RESERVED_SESSION_KEYS: [&str; 4] = ["user_id", "session_id", "created_at", "last_activity"];

/// Persisted state for one (user, session) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub session_id: String,
    /// Open-ended state fields, including the stamped `created_at` and
    /// `last_activity` (RFC 3339 strings)
    pub state: Map<String, Value>,
}

impl SessionRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_field("created_at")
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.timestamp_field("last_activity")
    }

    pub fn message_count(&self) -> i64 {
        self.state
            .get("message_count")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    fn timestamp_field(&self, key: &str) -> Option<DateTime<Utc>> {
        self.state
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Session summary for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub session_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub message_count: i64,
}

impl From<SessionRecord> for SessionInfo {
    fn from(record: SessionRecord) -> Self {
        SessionInfo {
            created_at: record.created_at(),
            last_activity: record.last_activity(),
            message_count: record.message_count(),
            user_id: record.user_id,
            session_id: record.session_id,
        }
    }
}

/// One-line human readable description of a session.
pub fn format_session_info(record: &SessionRecord) -> String {
    let created = record
        .get("created_at")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    format!(
        "Session {} for user {} (created: {}, messages: {})",
        record.session_id,
        record.user_id,
        created,
        record.message_count()
    )
}

/// Snapshot returned by `SessionMetrics::basic_stats`.
///
/// `total_sessions` and `active_sessions` are read from the sessions table;
/// `total_messages` is an in-process counter and restarts at zero with the
/// process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicStats {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub total_messages: u64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(state: Value) -> SessionRecord {
        SessionRecord {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            state: state.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_accessors() {
        let rec = record(json!({
            "created_at": "2025-03-01T10:00:00.000000Z",
            "last_activity": "2025-03-01T10:05:00.000000Z",
            "message_count": 4,
        }));
        assert_eq!(rec.message_count(), 4);
        assert!(rec.last_activity().unwrap() > rec.created_at().unwrap());
    }

    #[test]
    fn test_missing_fields_default() {
        let rec = record(json!({ "message_count": "many" }));
        assert_eq!(rec.message_count(), 0);
        assert!(rec.created_at().is_none());
        assert_eq!(
            format_session_info(&rec),
            "Session s1 for user u1 (created: unknown, messages: 0)"
        );
    }

    #[test]
    fn test_session_info_from_record() {
        let info: SessionInfo = record(json!({
            "created_at": "2025-03-01T10:00:00.000000Z",
            "message_count": 2,
        }))
        .into();
        assert_eq!(info.user_id, "u1");
        assert_eq!(info.message_count, 2);
        assert!(info.created_at.is_some());
        assert!(info.last_activity.is_none());
    }
}
