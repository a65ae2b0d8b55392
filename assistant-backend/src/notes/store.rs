//! NoteStore: SQLite notes table with an FTS5 search index
//!
//! The `notes` table is the source of truth. `notes_fts` mirrors the
//! searchable columns under the same rowid and is rewritten in the same
//! transaction as every base-table write, so the two never drift apart.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};

use super::dates::{day_bounds, day_start, parse_date_filter};
use super::query::{build_match_expression, sanitize_fts_query};
use crate::config::{defaults, NoteLimits, NotesConfig};
use crate::db::{now_timestamp, open_pool, parse_timestamp, DbPool};
use crate::error::{StoreError, StoreResult};
use crate::models::{Note, NoteListFilter, NotePreview, NoteUpdate};

const NOTE_COLUMNS: &str = "id, title, content, tags, category, created_at, updated_at, archived";

/// Columns a partial update may touch, each with its static SQL fragment.
#[derive(Debug, Clone, Copy)]
enum NoteField {
    Title,
    Content,
    Tags,
    Category,
}

impl NoteField {
    fn assignment(self) -> &'static str {
        match self {
            NoteField::Title => "title = ?",
            NoteField::Content => "content = ?",
            NoteField::Tags => "tags = ?",
            NoteField::Category => "category = ?",
        }
    }
}

/// Note storage with full-text search
pub struct NoteStore {
    pool: DbPool,
    limits: NoteLimits,
}

impl NoteStore {
    /// Open (or create) the notes database described by `config`.
    ///
    /// Rebuilds the search index when it is out of step with the notes table.
    pub fn open(config: &NotesConfig) -> StoreResult<Self> {
        let pool = open_pool(&config.db_path, config.busy_timeout)?;
        let store = Self {
            pool,
            limits: config.limits.clone(),
        };
        store.init_schema()?;

        let (notes, indexed) = store.row_counts()?;
        if notes != indexed {
            log::warn!(
                "[NOTES] Search index has {} rows for {} notes, rebuilding",
                indexed,
                notes
            );
            store.rebuild_index()?;
        }

        log::info!("[NOTES] Note store ready at {}", config.db_path);
        Ok(store)
    }

    pub fn limits(&self) -> &NoteLimits {
        &self.limits
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                category TEXT NOT NULL DEFAULT 'general',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_notes_archived_updated ON notes(archived, updated_at);
            CREATE INDEX IF NOT EXISTS idx_notes_category ON notes(category);
            CREATE INDEX IF NOT EXISTS idx_notes_created_at ON notes(created_at);
            CREATE VIRTUAL TABLE IF NOT EXISTS notes_fts USING fts5(
                title,
                content,
                tags,
                category,
                tokenize='porter unicode61'
            );",
        )?;
        Ok(())
    }

    fn row_counts(&self) -> StoreResult<(i64, i64)> {
        let conn = self.pool.get()?;
        let notes: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        let indexed: i64 = conn.query_row("SELECT COUNT(*) FROM notes_fts", [], |row| row.get(0))?;
        Ok((notes, indexed))
    }

    /// Create a note and return its id. Category defaults to `general`.
    pub fn create(
        &self,
        title: &str,
        content: &str,
        tags: Option<&[String]>,
        category: Option<&str>,
    ) -> StoreResult<i64> {
        let tags = tags.unwrap_or(&[]);
        let category = category.unwrap_or(defaults::CATEGORY);

        self.validate_title(title)?;
        self.validate_content(content)?;
        self.validate_tags(tags)?;
        self.validate_category(category)?;

        let tags_json = serde_json::to_string(tags)?;
        let now = now_timestamp();

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO notes (title, content, tags, category, created_at, updated_at, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0)",
            params![title, content, tags_json, category, now],
        )?;
        let id = tx.last_insert_rowid();
        index_note(&tx, id)?;
        tx.commit()?;

        log::info!("[NOTES] Created note {} ({:?})", id, title);
        Ok(id)
    }

    /// Fetch a note by id, archived or not.
    pub fn get(&self, id: i64) -> StoreResult<Note> {
        validate_id(id)?;
        let conn = self.pool.get()?;
        fetch_note(&conn, id)?.ok_or(StoreError::NoteNotFound(id))
    }

    /// Replace the supplied fields and refresh `updated_at`.
    pub fn update(&self, id: i64, update: &NoteUpdate) -> StoreResult<()> {
        validate_id(id)?;
        if update.is_empty() {
            return Err(StoreError::validation("No fields to update"));
        }

        let mut fields: Vec<NoteField> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(title) = &update.title {
            self.validate_title(title)?;
            fields.push(NoteField::Title);
            values.push(Box::new(title.clone()));
        }
        if let Some(content) = &update.content {
            self.validate_content(content)?;
            fields.push(NoteField::Content);
            values.push(Box::new(content.clone()));
        }
        if let Some(tags) = &update.tags {
            self.validate_tags(tags)?;
            fields.push(NoteField::Tags);
            values.push(Box::new(serde_json::to_string(tags)?));
        }
        if let Some(category) = &update.category {
            self.validate_category(category)?;
            fields.push(NoteField::Category);
            values.push(Box::new(category.clone()));
        }

        let mut assignments: Vec<&str> = fields.iter().map(|f| f.assignment()).collect();
        assignments.push("updated_at = ?");
        values.push(Box::new(now_timestamp()));
        values.push(Box::new(id));

        let sql = format!("UPDATE notes SET {} WHERE id = ?", assignments.join(", "));
        let params_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(&sql, params_refs.as_slice())?;
        if changed == 0 {
            return Err(StoreError::NoteNotFound(id));
        }
        index_note(&tx, id)?;
        tx.commit()?;

        log::info!("[NOTES] Updated note {} ({} fields)", id, fields.len());
        Ok(())
    }

    /// Hide a note from list and search. Archiving twice is not an error.
    pub fn archive(&self, id: i64) -> StoreResult<()> {
        validate_id(id)?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE notes SET archived = 1, updated_at = ?1 WHERE id = ?2",
            params![now_timestamp(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NoteNotFound(id));
        }
        index_note(&tx, id)?;
        tx.commit()?;

        log::info!("[NOTES] Archived note {}", id);
        Ok(())
    }

    /// Full-text search over non-archived notes, best match first.
    ///
    /// The query is sanitized before it reaches the index; a query with
    /// nothing left after sanitization returns no results.
    pub fn search(&self, query: &str, limit: Option<i64>) -> StoreResult<Vec<Note>> {
        if query.chars().count() > self.limits.max_query_len {
            return Err(StoreError::Validation(format!(
                "Search query too long (max {} characters)",
                self.limits.max_query_len
            )));
        }

        let sanitized = sanitize_fts_query(query);
        let Some(expression) = build_match_expression(&sanitized) else {
            log::debug!("[NOTES] Query {:?} empty after sanitization", query);
            return Ok(vec![]);
        };
        let limit = self.limits.clamp(limit, self.limits.default_search_limit);

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT n.id, n.title, n.content, n.tags, n.category, n.created_at, n.updated_at, n.archived
             FROM notes_fts
             JOIN notes n ON n.id = notes_fts.rowid
             WHERE notes_fts MATCH ?1 AND n.archived = 0
             ORDER BY bm25(notes_fts)
             LIMIT ?2",
        )?;

        let notes = stmt
            .query_map(params![expression, limit], note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        log::debug!("[NOTES] Search {:?} returned {} notes", expression, notes.len());
        Ok(notes)
    }

    /// List non-archived notes, most recently updated first.
    pub fn list(&self, filter: &NoteListFilter) -> StoreResult<Vec<NotePreview>> {
        let now = Utc::now();
        let mut clauses: Vec<&str> = vec!["archived = 0"];
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(category) = &filter.category {
            self.validate_category(category)?;
            clauses.push("category = ?");
            values.push(Box::new(category.clone()));
        }

        if let Some(on) = &filter.created_on {
            let (start, end) = day_bounds(parse_date_filter(on, now)?);
            clauses.push("created_at >= ?");
            values.push(Box::new(start));
            clauses.push("created_at < ?");
            values.push(Box::new(end));
        } else {
            if let Some(after) = &filter.created_after {
                clauses.push("created_at >= ?");
                values.push(Box::new(day_start(parse_date_filter(after, now)?)));
            }
            if let Some(before) = &filter.created_before {
                clauses.push("created_at < ?");
                values.push(Box::new(day_start(parse_date_filter(before, now)?)));
            }
        }

        let limit = self.limits.clamp(filter.limit, self.limits.default_list_limit);
        values.push(Box::new(limit));

        let sql = format!(
            "SELECT {} FROM notes WHERE {} ORDER BY updated_at DESC, id DESC LIMIT ?",
            NOTE_COLUMNS,
            clauses.join(" AND ")
        );
        let params_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let notes = stmt
            .query_map(params_refs.as_slice(), note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let preview_len = self.limits.preview_len;
        Ok(notes
            .into_iter()
            .map(|n| NotePreview::from_note(n, preview_len))
            .collect())
    }

    /// Tag usage across non-archived notes, most used first, then by name.
    /// Tags are compared case-insensitively.
    pub fn list_tags(&self) -> StoreResult<Vec<(String, usize)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT tags FROM notes WHERE archived = 0 AND tags != '[]'")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut tag_counts: HashMap<String, usize> = HashMap::new();
        for raw in rows {
            let tags: Vec<String> = serde_json::from_str(&raw)?;
            for tag in tags {
                let tag = tag.trim().to_lowercase();
                if !tag.is_empty() {
                    *tag_counts.entry(tag).or_insert(0) += 1;
                }
            }
        }

        let mut tags: Vec<(String, usize)> = tag_counts.into_iter().collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(tags)
    }

    /// Repopulate the search index from the notes table.
    pub fn rebuild_index(&self) -> StoreResult<usize> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM notes_fts", [])?;

        let ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM notes ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        for id in &ids {
            insert_index_row(&tx, *id)?;
        }
        tx.commit()?;

        log::info!("[NOTES] Indexed {} notes", ids.len());
        Ok(ids.len())
    }

    fn validate_title(&self, title: &str) -> StoreResult<()> {
        if title.trim().is_empty() {
            return Err(StoreError::validation("Title cannot be empty"));
        }
        check_len("Title", title, self.limits.max_title_len)
    }

    fn validate_content(&self, content: &str) -> StoreResult<()> {
        check_len("Content", content, self.limits.max_content_len)
    }

    fn validate_category(&self, category: &str) -> StoreResult<()> {
        check_len("Category", category, self.limits.max_category_len)
    }

    fn validate_tags(&self, tags: &[String]) -> StoreResult<()> {
        if tags.len() > self.limits.max_tags {
            return Err(StoreError::Validation(format!(
                "Too many tags (max {})",
                self.limits.max_tags
            )));
        }
        tags.iter()
            .try_for_each(|tag| check_len("Tag", tag, self.limits.max_tag_len))
    }
}

fn validate_id(id: i64) -> StoreResult<()> {
    if id <= 0 {
        return Err(StoreError::validation("Note ID must be a positive integer"));
    }
    Ok(())
}

fn check_len(field: &str, value: &str, max: usize) -> StoreResult<()> {
    if value.chars().count() > max {
        return Err(StoreError::Validation(format!(
            "{} too long (max {} characters)",
            field, max
        )));
    }
    Ok(())
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let tags_json: String = row.get(3)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        tags,
        category: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
        archived: row.get::<_, i64>(7)? != 0,
    })
}

fn fetch_note(conn: &Connection, id: i64) -> rusqlite::Result<Option<Note>> {
    conn.query_row(
        &format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS),
        params![id],
        note_from_row,
    )
    .optional()
}

/// Replace the index row for note `id` with its current base-table values.
fn index_note(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM notes_fts WHERE rowid = ?1", params![id])?;
    insert_index_row(conn, id)
}

fn insert_index_row(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    let Some(note) = fetch_note(conn, id)? else {
        return Ok(());
    };
    conn.execute(
        "INSERT INTO notes_fts (rowid, title, content, tags, category) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, note.title, note.content, note.tags.join(" "), note.category],
    )?;
    Ok(())
}
