//! Note model

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::markup::derive_title;

/// Placeholder content of a freshly created note.
pub const NEW_NOTE_CONTENT: &str = "<h1>Start Writing...</h1>";

/// Placeholder title of a freshly created note.
pub const NEW_NOTE_TITLE: &str = "New Note";

/// An opaque, store-assigned note identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Wrap an identifier handed out by a store
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier (used by stores when creating documents)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A note, either persisted (`id` set) or a new unsaved draft (`id` unset)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned identifier; `None` until the first save
    pub id: Option<NoteId>,
    /// Title derived from content at save time
    pub title: String,
    /// Rich-text markup
    pub content: String,
    /// Server timestamp (Unix ms) of the last write; `None` while pending
    pub updated_at: Option<i64>,
}

impl Note {
    /// Create the placeholder note shown by the "new note" action
    #[must_use]
    pub fn draft() -> Self {
        Self {
            id: None,
            title: NEW_NOTE_TITLE.to_string(),
            content: NEW_NOTE_CONTENT.to_string(),
            updated_at: None,
        }
    }

    /// Whether this note has been written to the store
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Whether this note carries the given id
    #[must_use]
    pub fn has_id(&self, id: &NoteId) -> bool {
        self.id.as_ref() == Some(id)
    }

    /// Build the full write for this note, re-deriving the title from content
    #[must_use]
    pub fn save_patch(&self) -> NotePatch {
        NotePatch {
            title: Some(derive_title(&self.content)),
            content: Some(self.content.clone()),
        }
    }
}

/// Fields of a store write. `None` fields are left untouched by a merge-update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}
