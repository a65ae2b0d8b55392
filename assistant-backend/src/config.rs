use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const NOTES_DB_PATH: &str = "NOTES_DB_PATH";
    pub const SESSIONS_DB_PATH: &str = "SESSIONS_DB_PATH";
    /// Busy timeout applied to every pooled SQLite connection.
    pub const DB_TIMEOUT_SECS: &str = "DB_TIMEOUT_SECS";
    pub const MAX_TITLE_LENGTH: &str = "NOTES_MAX_TITLE_LENGTH";
    pub const MAX_CONTENT_LENGTH: &str = "NOTES_MAX_CONTENT_LENGTH";
    pub const MAX_CATEGORY_LENGTH: &str = "NOTES_MAX_CATEGORY_LENGTH";
    pub const MAX_TAG_LENGTH: &str = "NOTES_MAX_TAG_LENGTH";
    pub const MAX_TAGS: &str = "NOTES_MAX_TAGS";
    pub const MAX_QUERY_LENGTH: &str = "NOTES_MAX_QUERY_LENGTH";
    pub const DEFAULT_SEARCH_LIMIT: &str = "NOTES_DEFAULT_SEARCH_LIMIT";
    pub const DEFAULT_LIST_LIMIT: &str = "NOTES_DEFAULT_LIST_LIMIT";
    pub const MAX_RESULT_LIMIT: &str = "NOTES_MAX_RESULT_LIMIT";
}

/// Default values
pub mod defaults {
    pub const NOTES_DB_PATH: &str = "./.db/notes.db";
    pub const SESSIONS_DB_PATH: &str = "./.db/sessions.db";
    pub const DB_TIMEOUT_SECS: u64 = 30;
    pub const MAX_TITLE_LENGTH: usize = 1000;
    pub const MAX_CONTENT_LENGTH: usize = 100_000_000;
    pub const MAX_CATEGORY_LENGTH: usize = 1000;
    pub const MAX_TAG_LENGTH: usize = 1000;
    pub const MAX_TAGS: usize = 1000;
    pub const MAX_QUERY_LENGTH: usize = 1000;
    pub const DEFAULT_SEARCH_LIMIT: i64 = 100;
    pub const DEFAULT_LIST_LIMIT: i64 = 200;
    pub const MAX_RESULT_LIMIT: i64 = 1000;
    pub const PREVIEW_LENGTH: usize = 200;
    pub const CATEGORY: &str = "general";
}

/// Read an env var and parse it, falling back to `default` when unset or invalid.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("Ignoring invalid {}={:?}, using default {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Like `env_or`, but a non-positive value falls back to `default`.
fn positive_env_or(name: &str, default: i64) -> i64 {
    let value = env_or(name, default);
    if value > 0 {
        value
    } else {
        log::warn!("Ignoring non-positive {}={}, using default {}", name, value, default);
        default
    }
}

/// Strip path traversal sequences and force a `.db` extension.
pub fn sanitize_db_path(path: &str) -> Result<String, String> {
    if path.trim().is_empty() {
        return Err("Database path must be a non-empty string".to_string());
    }

    let mut cleaned = path.replace("..", "");
    while cleaned.contains("//") {
        cleaned = cleaned.replace("//", "/");
    }
    while cleaned.contains("\\\\") {
        cleaned = cleaned.replace("\\\\", "\\");
    }

    if !cleaned.ends_with(".db") {
        cleaned.push_str(".db");
    }

    Ok(cleaned)
}

/// Ensure the parent directory of a database file exists.
pub fn ensure_parent_dir(db_path: &str) -> std::io::Result<()> {
    match Path::new(db_path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Validation and paging limits for the note store
#[derive(Clone, Debug)]
pub struct NoteLimits {
    pub max_title_len: usize,
    pub max_content_len: usize,
    pub max_category_len: usize,
    pub max_tag_len: usize,
    pub max_tags: usize,
    pub max_query_len: usize,
    pub default_search_limit: i64,
    pub default_list_limit: i64,
    /// Upper bound for both search and list result counts
    pub max_result_limit: i64,
    /// Characters of content kept in list previews
    pub preview_len: usize,
}

impl Default for NoteLimits {
    fn default() -> Self {
        Self {
            max_title_len: defaults::MAX_TITLE_LENGTH,
            max_content_len: defaults::MAX_CONTENT_LENGTH,
            max_category_len: defaults::MAX_CATEGORY_LENGTH,
            max_tag_len: defaults::MAX_TAG_LENGTH,
            max_tags: defaults::MAX_TAGS,
            max_query_len: defaults::MAX_QUERY_LENGTH,
            default_search_limit: defaults::DEFAULT_SEARCH_LIMIT,
            default_list_limit: defaults::DEFAULT_LIST_LIMIT,
            max_result_limit: defaults::MAX_RESULT_LIMIT,
            preview_len: defaults::PREVIEW_LENGTH,
        }
    }
}

impl NoteLimits {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_title_len: env_or(env_vars::MAX_TITLE_LENGTH, d.max_title_len),
            max_content_len: env_or(env_vars::MAX_CONTENT_LENGTH, d.max_content_len),
            max_category_len: env_or(env_vars::MAX_CATEGORY_LENGTH, d.max_category_len),
            max_tag_len: env_or(env_vars::MAX_TAG_LENGTH, d.max_tag_len),
            max_tags: env_or(env_vars::MAX_TAGS, d.max_tags),
            max_query_len: env_or(env_vars::MAX_QUERY_LENGTH, d.max_query_len),
            default_search_limit: positive_env_or(env_vars::DEFAULT_SEARCH_LIMIT, d.default_search_limit),
            default_list_limit: positive_env_or(env_vars::DEFAULT_LIST_LIMIT, d.default_list_limit),
            max_result_limit: positive_env_or(env_vars::MAX_RESULT_LIMIT, d.max_result_limit),
            preview_len: d.preview_len,
        }
    }

    /// Resolve a caller-supplied limit: missing or non-positive uses the
    /// default, and the result always lies in `1..=max_result_limit`.
    pub fn clamp(&self, requested: Option<i64>, default: i64) -> i64 {
        let max = self.max_result_limit.max(1);
        let n = match requested {
            Some(n) if n > 0 => n,
            _ => default,
        };
        n.clamp(1, max)
    }
}

/// Configuration for the notes database (SQLite + FTS5)
#[derive(Clone, Debug)]
pub struct NotesConfig {
    /// Path to the notes database file (sanitized)
    pub db_path: String,
    pub busy_timeout: Duration,
    pub limits: NoteLimits,
}

impl NotesConfig {
    /// Config for a database at `db_path` with default limits.
    pub fn at(db_path: &str) -> Result<Self, String> {
        Ok(Self {
            db_path: sanitize_db_path(db_path)?,
            busy_timeout: Duration::from_secs(defaults::DB_TIMEOUT_SECS),
            limits: NoteLimits::default(),
        })
    }
}

/// Configuration for the sessions database
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub db_path: String,
    pub busy_timeout: Duration,
}

impl SessionConfig {
    pub fn at(db_path: &str) -> Result<Self, String> {
        Ok(Self {
            db_path: sanitize_db_path(db_path)?,
            busy_timeout: Duration::from_secs(defaults::DB_TIMEOUT_SECS),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub notes: NotesConfig,
    pub sessions: SessionConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let busy_timeout = Duration::from_secs(env_or(
            env_vars::DB_TIMEOUT_SECS,
            defaults::DB_TIMEOUT_SECS,
        ));

        let notes_path = env::var(env_vars::NOTES_DB_PATH)
            .unwrap_or_else(|_| defaults::NOTES_DB_PATH.to_string());
        let sessions_path = env::var(env_vars::SESSIONS_DB_PATH)
            .unwrap_or_else(|_| defaults::SESSIONS_DB_PATH.to_string());

        Ok(Self {
            notes: NotesConfig {
                db_path: sanitize_db_path(&notes_path)?,
                busy_timeout,
                limits: NoteLimits::from_env(),
            },
            sessions: SessionConfig {
                db_path: sanitize_db_path(&sessions_path)?,
                busy_timeout,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_db_path_strips_traversal() {
        assert_eq!(sanitize_db_path("../../etc/passwd").unwrap(), "/etc/passwd.db");
        assert_eq!(sanitize_db_path("data//notes.db").unwrap(), "data/notes.db");
        assert_eq!(sanitize_db_path("a\\\\b.db").unwrap(), "a\\b.db");
    }

    #[test]
    fn test_sanitize_db_path_forces_extension() {
        assert_eq!(sanitize_db_path("notes").unwrap(), "notes.db");
        assert_eq!(sanitize_db_path("./.db/notes.db").unwrap(), "./.db/notes.db");
        assert_eq!(sanitize_db_path("notes.sqlite").unwrap(), "notes.sqlite.db");
    }

    #[test]
    fn test_sanitize_db_path_rejects_empty() {
        assert!(sanitize_db_path("").is_err());
        assert!(sanitize_db_path("   ").is_err());
    }

    #[test]
    fn test_limit_clamping() {
        let limits = NoteLimits::default();
        assert_eq!(limits.clamp(None, 100), 100);
        assert_eq!(limits.clamp(Some(0), 100), 100);
        assert_eq!(limits.clamp(Some(-5), 200), 200);
        assert_eq!(limits.clamp(Some(25), 100), 25);
        assert_eq!(limits.clamp(Some(999_999), 100), 1000);
    }

    #[test]
    fn test_limit_clamping_with_bad_bounds() {
        let limits = NoteLimits {
            max_result_limit: -1,
            ..NoteLimits::default()
        };
        assert_eq!(limits.clamp(Some(5), 100), 1);
        assert_eq!(limits.clamp(None, 100), 1);

        let limits = NoteLimits::default();
        assert_eq!(limits.clamp(None, 0), 1);
        assert_eq!(limits.clamp(None, -10), 1);
    }

    #[test]
    fn test_non_positive_env_limits_fall_back_to_defaults() {
        // No other test in this binary reads these variables
        unsafe {
            env::set_var(env_vars::MAX_RESULT_LIMIT, "-1");
            env::set_var(env_vars::DEFAULT_SEARCH_LIMIT, "0");
            env::set_var(env_vars::DEFAULT_LIST_LIMIT, "25");
        }
        let limits = NoteLimits::from_env();
        unsafe {
            env::remove_var(env_vars::MAX_RESULT_LIMIT);
            env::remove_var(env_vars::DEFAULT_SEARCH_LIMIT);
            env::remove_var(env_vars::DEFAULT_LIST_LIMIT);
        }

        assert_eq!(limits.max_result_limit, defaults::MAX_RESULT_LIMIT);
        assert_eq!(limits.default_search_limit, defaults::DEFAULT_SEARCH_LIMIT);
        assert_eq!(limits.default_list_limit, 25);
    }
}
