//! Notes: SQLite-backed notes with FTS5 search
//!
//! Notes are never deleted, only archived. Every write keeps the search
//! index in step with the notes table inside one transaction.

pub mod dates;
pub mod query;
pub mod store;

pub use query::sanitize_fts_query;
pub use store::NoteStore;
