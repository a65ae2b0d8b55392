//! Notes Tool: agent access to the note store
//!
//! Single tool with `action` parameter: create, search, get, list, update,
//! delete, tags. `delete` archives; notes are never removed.

use crate::error::{StoreError, StoreResult};
use crate::models::{NoteListFilter, NoteUpdate};
use crate::notes::NoteStore;
use crate::tools::registry::Tool;
use crate::tools::types::{PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator};

const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
enum NotesAction {
    Create,
    Search,
    Get,
    List,
    Update,
    Delete,
    Tags,
}

impl NotesAction {
    fn names() -> Vec<String> {
        NotesAction::iter().map(|a| a.as_ref().to_string()).collect()
    }
}

pub struct NotesTool {
    definition: ToolDefinition,
}

impl NotesTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();

        properties.insert(
            "action".to_string(),
            PropertySchema {
                enum_values: Some(NotesAction::names()),
                ..PropertySchema::new("string", "Action to perform on notes. 'delete' archives the note.")
            },
        );
        properties.insert(
            "title".to_string(),
            PropertySchema::new("string", "Note title (required for create, optional for update)."),
        );
        properties.insert(
            "content".to_string(),
            PropertySchema::new("string", "Note content (required for create, optional for update)."),
        );
        properties.insert(
            "tags".to_string(),
            PropertySchema {
                items: Some(Box::new(PropertySchema::new("string", "Tag"))),
                ..PropertySchema::new(
                    "array",
                    "Tags for the note (create/update). A comma-separated string is also accepted.",
                )
            },
        );
        properties.insert(
            "category".to_string(),
            PropertySchema {
                default: Some(json!("general")),
                ..PropertySchema::new("string", "Note category (create/update), or a filter for list.")
            },
        );
        properties.insert(
            "query".to_string(),
            PropertySchema::new("string", "Full-text search query (for search)."),
        );
        properties.insert(
            "note_id".to_string(),
            PropertySchema::new("integer", "Note ID (for get, update, delete)."),
        );
        properties.insert(
            "limit".to_string(),
            PropertySchema::new(
                "integer",
                "Maximum number of results for search/list (default: 100 for search, 200 for list; max: 1000).",
            ),
        );
        for (name, description) in [
            ("created_after", "List notes created on or after this date (YYYY-MM-DD, today, yesterday, this week, this month)."),
            ("created_before", "List notes created before this date."),
            ("created_on", "List notes created on this date. Overrides created_after/created_before."),
        ] {
            properties.insert(name.to_string(), PropertySchema::new("string", description));
        }

        Self {
            definition: ToolDefinition {
                name: "notes".to_string(),
                description: "Create, search, read, list, update and archive personal notes. Notes are full-text indexed and organized by category and tags.".to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["action".to_string()],
                },
            },
        }
    }
}

impl Default for NotesTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Tags arrive either as a JSON array or as a comma-separated string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagsParam {
    List(Vec<String>),
    Csv(String),
}

impl TagsParam {
    fn into_vec(self) -> Vec<String> {
        match self {
            TagsParam::List(tags) => tags,
            TagsParam::Csv(s) => parse_csv(&s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotesParams {
    action: String,
    title: Option<String>,
    content: Option<String>,
    tags: Option<TagsParam>,
    category: Option<String>,
    query: Option<String>,
    note_id: Option<i64>,
    limit: Option<i64>,
    created_after: Option<String>,
    created_before: Option<String>,
    created_on: Option<String>,
}

/// Parse comma-separated list into Vec<String>
fn parse_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Trimmed value, or `None` when missing or blank
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Run a synchronous store call off the async runtime.
async fn with_store<T, F>(store: &Arc<NoteStore>, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&NoteStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| StoreError::Storage(format!("store task failed: {}", e)))?
}

/// Turn a store error into a failed result. Storage details stay in the log.
fn store_error(action: NotesAction, context: &ToolContext, err: StoreError) -> ToolResult {
    let user = context.user_id.as_deref().unwrap_or("-");
    let session = context.session_id.as_deref().unwrap_or("-");
    match err {
        StoreError::Storage(detail) => {
            log::error!(
                "[TOOLS] notes {} failed (user={}, session={}): {}",
                action.as_ref(),
                user,
                session,
                detail
            );
            ToolResult::error(format!("Error: {}", UNEXPECTED_ERROR))
        }
        other => {
            log::warn!(
                "[TOOLS] notes {} rejected (user={}, session={}): {}",
                action.as_ref(),
                user,
                session,
                other
            );
            ToolResult::error(format!("Error: {}", other))
        }
    }
}

fn summary_line(id: i64, title: &str, category: &str) -> String {
    format!("ID: {}, Title: {}, Category: {}", id, title, category)
}

#[async_trait]
impl Tool for NotesTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let params: NotesParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let action: NotesAction = match params.action.parse() {
            Ok(a) => a,
            Err(_) => {
                return ToolResult::error(format!(
                    "Error: Invalid action '{}'. Available actions: {}",
                    params.action,
                    NotesAction::names().join(", ")
                ));
            }
        };

        let notes_store = match &context.notes_store {
            Some(store) => store,
            None => {
                return ToolResult::error(
                    "Notes store not available. The notes system must be initialized.",
                );
            }
        };

        match action {
            NotesAction::Create => {
                let Some(title) = non_blank(&params.title) else {
                    return ToolResult::error("Error: Title is required to create a note.");
                };
                let Some(content) = non_blank(&params.content) else {
                    return ToolResult::error("Error: Content is required to create a note.");
                };
                let tags = params.tags.map(TagsParam::into_vec).unwrap_or_default();
                let category = params.category;

                let title_for_store = title.clone();
                let result = with_store(notes_store, move |store| {
                    store.create(&title_for_store, &content, Some(tags.as_slice()), category.as_deref())
                })
                .await;

                match result {
                    Ok(id) => ToolResult::success(format!("Note created successfully with ID: {}", id))
                        .with_metadata(json!({
                            "action": "create",
                            "note_id": id,
                            "title": title,
                        })),
                    Err(e) => store_error(action, context, e),
                }
            }

            NotesAction::Search => {
                let Some(query) = non_blank(&params.query) else {
                    return ToolResult::error("Error: Search query is required.");
                };
                let limit = params.limit;

                let q = query.clone();
                match with_store(notes_store, move |store| store.search(&q, limit)).await {
                    Ok(notes) if notes.is_empty() => {
                        ToolResult::success("No notes found matching your search.")
                    }
                    Ok(notes) => {
                        let lines: Vec<String> = notes
                            .iter()
                            .map(|n| summary_line(n.id, &n.title, &n.category))
                            .collect();
                        ToolResult::success(format!("Found {} notes:\n{}", notes.len(), lines.join("\n")))
                            .with_metadata(json!({
                                "action": "search",
                                "query": query,
                                "result_count": notes.len(),
                            }))
                    }
                    Err(e) => store_error(action, context, e),
                }
            }

            NotesAction::Get => {
                let Some(id) = params.note_id else {
                    return ToolResult::error("Error: Note ID is required.");
                };

                match with_store(notes_store, move |store| store.get(id)).await {
                    Ok(note) => ToolResult::success(format!(
                        "Title: {}\nContent: {}\nTags: {}\nCategory: {}",
                        note.title,
                        note.content,
                        note.tags.join(", "),
                        note.category
                    ))
                    .with_metadata(json!({
                        "action": "get",
                        "note_id": note.id,
                        "archived": note.archived,
                    })),
                    Err(e) => store_error(action, context, e),
                }
            }

            NotesAction::List => {
                let filter = NoteListFilter {
                    category: non_blank(&params.category),
                    limit: params.limit,
                    created_after: non_blank(&params.created_after),
                    created_before: non_blank(&params.created_before),
                    created_on: non_blank(&params.created_on),
                };

                match with_store(notes_store, move |store| store.list(&filter)).await {
                    Ok(notes) if notes.is_empty() => ToolResult::success("No notes found."),
                    Ok(notes) => {
                        let lines: Vec<String> = notes
                            .iter()
                            .map(|n| summary_line(n.id, &n.title, &n.category))
                            .collect();
                        ToolResult::success(format!("Found {} notes:\n{}", notes.len(), lines.join("\n")))
                            .with_metadata(json!({
                                "action": "list",
                                "result_count": notes.len(),
                            }))
                    }
                    Err(e) => store_error(action, context, e),
                }
            }

            NotesAction::Update => {
                let Some(id) = params.note_id else {
                    return ToolResult::error("Error: Note ID is required.");
                };
                let update = NoteUpdate {
                    title: non_blank(&params.title),
                    content: non_blank(&params.content),
                    tags: params.tags.map(TagsParam::into_vec),
                    category: non_blank(&params.category),
                };
                let field_count = [
                    update.title.is_some(),
                    update.content.is_some(),
                    update.tags.is_some(),
                    update.category.is_some(),
                ]
                .iter()
                .filter(|set| **set)
                .count();

                match with_store(notes_store, move |store| store.update(id, &update)).await {
                    Ok(()) => ToolResult::success(format!(
                        "Note updated successfully. Updated {} fields.",
                        field_count
                    ))
                    .with_metadata(json!({
                        "action": "update",
                        "note_id": id,
                        "updated_fields": field_count,
                    })),
                    Err(e) => store_error(action, context, e),
                }
            }

            NotesAction::Delete => {
                let Some(id) = params.note_id else {
                    return ToolResult::error("Error: Note ID is required.");
                };

                match with_store(notes_store, move |store| store.archive(id)).await {
                    Ok(()) => ToolResult::success("Note deleted successfully.").with_metadata(json!({
                        "action": "delete",
                        "note_id": id,
                    })),
                    Err(e) => store_error(action, context, e),
                }
            }

            NotesAction::Tags => match with_store(notes_store, |store| store.list_tags()).await {
                Ok(tags) if tags.is_empty() => ToolResult::success("No tags yet."),
                Ok(tags) => {
                    let mut output = format!("Found {} tags:\n", tags.len());
                    for (tag, count) in &tags {
                        output.push_str(&format!(
                            "- {} ({} note{})\n",
                            tag,
                            count,
                            if *count == 1 { "" } else { "s" }
                        ));
                    }
                    ToolResult::success(output.trim_end()).with_metadata(json!({
                        "action": "tags",
                        "tag_count": tags.len(),
                    }))
                }
                Err(e) => store_error(action, context, e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotesConfig;
    use tempfile::{tempdir, TempDir};

    fn context() -> (TempDir, ToolContext) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.db");
        let config = NotesConfig::at(path.to_str().unwrap()).unwrap();
        let store = Arc::new(NoteStore::open(&config).unwrap());
        (dir, ToolContext::new().with_notes_store(store))
    }

    #[test]
    fn test_parse_csv() {
        assert_eq!(parse_csv("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_csv("").is_empty());
    }

    #[test]
    fn test_definition_lists_actions() {
        let def = NotesTool::new().definition();
        assert_eq!(def.name, "notes");
        let actions = def.input_schema.properties["action"].enum_values.clone().unwrap();
        assert_eq!(actions, vec!["create", "search", "get", "list", "update", "delete", "tags"]);
    }

    #[tokio::test]
    async fn test_create_then_search_and_get() {
        let (_dir, ctx) = context();
        let tool = NotesTool::new();

        let created = tool
            .execute(
                json!({"action": "create", "title": " Groceries ", "content": "buy milk", "tags": ["shop"]}),
                &ctx,
            )
            .await;
        assert!(created.success, "{}", created.content);
        assert_eq!(created.content, "Note created successfully with ID: 1");

        let found = tool.execute(json!({"action": "search", "query": "milk"}), &ctx).await;
        assert!(found.success);
        assert_eq!(found.content, "Found 1 notes:\nID: 1, Title: Groceries, Category: general");

        let got = tool.execute(json!({"action": "get", "note_id": 1}), &ctx).await;
        assert_eq!(got.content, "Title: Groceries\nContent: buy milk\nTags: shop\nCategory: general");
    }

    #[tokio::test]
    async fn test_required_parameters() {
        let (_dir, ctx) = context();
        let tool = NotesTool::new();

        let r = tool.execute(json!({"action": "create", "content": "x"}), &ctx).await;
        assert!(!r.success);
        assert_eq!(r.content, "Error: Title is required to create a note.");

        let r = tool.execute(json!({"action": "create", "title": "x", "content": "  "}), &ctx).await;
        assert_eq!(r.content, "Error: Content is required to create a note.");

        let r = tool.execute(json!({"action": "get"}), &ctx).await;
        assert_eq!(r.content, "Error: Note ID is required.");

        let r = tool.execute(json!({"action": "search", "query": ""}), &ctx).await;
        assert_eq!(r.content, "Error: Search query is required.");

        let r = tool.execute(json!({"action": "explode"}), &ctx).await;
        assert!(!r.success);
        assert!(r.content.starts_with("Error: Invalid action 'explode'"));
    }

    #[tokio::test]
    async fn test_update_delete_and_tags() {
        let (_dir, ctx) = context();
        let tool = NotesTool::new();
        tool.execute(
            json!({"action": "create", "title": "Trip", "content": "pack bags", "tags": "travel, todo"}),
            &ctx,
        )
        .await;

        let r = tool
            .execute(json!({"action": "update", "note_id": 1, "content": "pack bags and passport"}), &ctx)
            .await;
        assert_eq!(r.content, "Note updated successfully. Updated 1 fields.");

        let r = tool.execute(json!({"action": "update", "note_id": 1}), &ctx).await;
        assert!(!r.success);
        assert!(r.content.contains("No fields to update"));

        let r = tool.execute(json!({"action": "tags"}), &ctx).await;
        assert_eq!(r.content, "Found 2 tags:\n- todo (1 note)\n- travel (1 note)");

        let r = tool.execute(json!({"action": "delete", "note_id": 1}), &ctx).await;
        assert_eq!(r.content, "Note deleted successfully.");

        let r = tool.execute(json!({"action": "list"}), &ctx).await;
        assert_eq!(r.content, "No notes found.");

        let r = tool.execute(json!({"action": "get", "note_id": 99}), &ctx).await;
        assert!(!r.success);
        assert_eq!(r.content, "Error: Note 99 not found");
    }

    #[tokio::test]
    async fn test_list_with_date_filter() {
        let (_dir, ctx) = context();
        let tool = NotesTool::new();
        tool.execute(json!({"action": "create", "title": "a", "content": "b", "category": "work"}), &ctx)
            .await;

        let r = tool
            .execute(json!({"action": "list", "category": "work", "created_on": "today"}), &ctx)
            .await;
        assert_eq!(r.content, "Found 1 notes:\nID: 1, Title: a, Category: work");

        let r = tool.execute(json!({"action": "list", "created_on": "whenever"}), &ctx).await;
        assert!(!r.success);
        assert!(r.content.starts_with("Error: Invalid input"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_generically() {
        let (dir, ctx) = context();
        let ctx = ctx.with_session("u1", "chat");
        let tool = NotesTool::new();
        tool.execute(json!({"action": "create", "title": "Groceries", "content": "buy milk"}), &ctx)
            .await;

        // Break the index behind the store's back
        let raw = rusqlite::Connection::open(dir.path().join("notes.db")).unwrap();
        raw.execute_batch("DROP TABLE notes_fts").unwrap();
        drop(raw);

        let r = tool.execute(json!({"action": "search", "query": "milk"}), &ctx).await;
        assert!(!r.success);
        assert_eq!(r.content, "Error: An unexpected error occurred. Please try again.");
        assert!(!r.content.contains("notes_fts"));

        let r = tool
            .execute(json!({"action": "create", "title": "Another", "content": "note"}), &ctx)
            .await;
        assert!(!r.success);
        assert_eq!(r.content, "Error: An unexpected error occurred. Please try again.");
    }

    #[tokio::test]
    async fn test_missing_store() {
        let tool = NotesTool::new();
        let r = tool.execute(json!({"action": "list"}), &ToolContext::new()).await;
        assert!(!r.success);
    }
}
