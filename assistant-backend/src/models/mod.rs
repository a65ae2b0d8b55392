mod note;
mod session;

pub use note::{truncate_preview, Note, NoteListFilter, NotePreview, NoteUpdate};
pub use session::{format_session_info, BasicStats, SessionInfo, SessionRecord, RESERVED_SESSION_KEYS};
