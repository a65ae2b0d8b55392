use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored note. Archived notes are kept, only hidden from list/search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived: bool,
}

/// Listing row: same as a note, with content cut down to a preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotePreview {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotePreview {
    pub fn from_note(note: Note, preview_len: usize) -> Self {
        NotePreview {
            id: note.id,
            title: note.title,
            content: truncate_preview(&note.content, preview_len),
            tags: note.tags,
            category: note.category,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// Cut `content` to `max_chars` characters and mark the cut with "...".
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &content[..byte_idx]),
        None => content.to_string(),
    }
}

/// Partial update. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none() && self.category.is_none()
    }
}

/// Filters for listing notes. All present filters are AND-ed together;
/// `created_on` wins over `created_after`/`created_before`.
///
/// Dates accept `YYYY-MM-DD`, RFC 3339, or one of the keywords
/// `today`, `now`, `yesterday`, `this week`, `week`, `this month`, `month`.
/// Keywords resolve to UTC calendar days, the same clock `created_at` is
/// stored in, so a host's local timezone never shifts a filter. RFC 3339
/// inputs with an offset are converted to UTC before taking the day.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NoteListFilter {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
    pub created_on: Option<String>,
}

impl NoteListFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }

    pub fn created_on(date: impl Into<String>) -> Self {
        Self {
            created_on: Some(date.into()),
            ..Default::default()
        }
    }
}
