//! Data models for Notepad

mod note;
mod snapshot;

pub use note::{Note, NoteId, NotePatch, NEW_NOTE_CONTENT, NEW_NOTE_TITLE};
pub use snapshot::{sort_notes, Snapshot};
