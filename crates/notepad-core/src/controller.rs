//! Note lifecycle state machine.
//!
//! [`NoteController`] owns the local note list, the active note and the
//! loading flag. It performs no I/O: the workspace feeds it snapshots and the
//! results of store calls.

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NotePatch, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveNote {
    note: Note,
    dirty: bool,
}

impl ActiveNote {
    const fn clean(note: Note) -> Self {
        Self { note, dirty: false }
    }
}

/// The write a save of the active note must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingSave {
    /// Unsaved draft: create a new document
    Create(NotePatch),
    /// Persisted note: merge the fields into the existing document
    Update(NoteId, NotePatch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteController {
    notes: Vec<Note>,
    active: Option<ActiveNote>,
    loading: bool,
}

impl Default for NoteController {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteController {
    /// Controller waiting for its first snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            notes: Vec::new(),
            active: None,
            loading: true,
        }
    }

    /// The last received snapshot, newest first
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[must_use]
    pub fn active(&self) -> Option<&Note> {
        self.active.as_ref().map(|active| &active.note)
    }

    #[must_use]
    pub fn active_id(&self) -> Option<&NoteId> {
        self.active().and_then(|note| note.id.as_ref())
    }

    /// Whether the active note has edits that were not saved yet
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.active.as_ref().is_some_and(|active| active.dirty)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Leave the loading state without a snapshot (bootstrap failed).
    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    /// Replace the local list with a snapshot.
    ///
    /// With nothing active, the first listed note is activated, or a new
    /// draft when the list is empty. A clean persisted active note is
    /// refreshed when the snapshot carries a newer copy of it. A dirty active
    /// note is never touched, and an active note absent from the snapshot
    /// stays active.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.notes = snapshot.into_notes();
        tracing::debug!("Applied snapshot with {} notes", self.notes.len());

        match self.active.as_mut() {
            None => {
                let note = self.notes.first().cloned().unwrap_or_else(Note::draft);
                self.active = Some(ActiveNote::clean(note));
            }
            Some(active) if !active.dirty => {
                let newer = active.note.id.as_ref().and_then(|id| {
                    self.notes
                        .iter()
                        .find(|note| note.has_id(id))
                        .filter(|note| note.updated_at > active.note.updated_at)
                });
                if let Some(newer) = newer {
                    active.note = newer.clone();
                }
            }
            Some(_) => {}
        }

        self.loading = false;
    }

    /// Activate a fresh unsaved draft.
    ///
    /// Returns the previous active note when it had unsaved edits, which are
    /// discarded.
    pub fn new_note(&mut self) -> Option<Note> {
        self.activate(Note::draft())
    }

    /// Activate a listed note. Unsaved edits of the previous active note are
    /// discarded and returned.
    pub fn select(&mut self, id: &NoteId) -> Result<Option<Note>> {
        let note = self
            .notes
            .iter()
            .find(|note| note.has_id(id))
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(self.activate(note))
    }

    /// Replace the active note's content in memory. Returns `false` when no
    /// note is active.
    pub fn edit(&mut self, content: impl Into<String>) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let content = content.into();
        if active.note.content != content {
            active.note.content = content;
            active.dirty = true;
        }
        true
    }

    /// The write needed to save the active note, if any note is active.
    #[must_use]
    pub fn prepare_save(&self) -> Option<PendingSave> {
        let note = self.active()?;
        let patch = note.save_patch();
        Some(match &note.id {
            Some(id) => PendingSave::Update(id.clone(), patch),
            None => PendingSave::Create(patch),
        })
    }

    /// Record a completed create: the active draft adopts the store-assigned
    /// id and the fields that were written, such as the derived title.
    pub fn complete_create(&mut self, id: NoteId, written: &NotePatch) {
        match self.active.as_mut() {
            Some(active) if active.note.id.is_none() => {
                active.note.id = Some(id);
                apply_patch(&mut active.note, written);
                active.dirty = false;
            }
            _ => tracing::warn!("Created note {} but no draft is active", id),
        }
    }

    /// Record a completed merge-update of `id` with the fields written.
    pub fn complete_update(&mut self, id: &NoteId, written: &NotePatch) {
        if let Some(active) = self.active.as_mut() {
            if active.note.has_id(id) {
                apply_patch(&mut active.note, written);
                active.dirty = false;
            }
        }
    }

    /// Optimistically drop `id` from the local list.
    ///
    /// If it was the active note, the first remaining note becomes active, or
    /// a new draft when none remain. Returns whether anything changed.
    pub fn remove_local(&mut self, id: &NoteId) -> bool {
        let before = self.notes.len();
        self.notes.retain(|note| !note.has_id(id));
        let removed = self.notes.len() != before;

        let was_active = self
            .active
            .as_ref()
            .is_some_and(|active| active.note.has_id(id));
        if was_active {
            self.activate_first_or_draft();
        }
        removed || was_active
    }

    /// Drop an unsaved active draft, activating the first listed note or a
    /// new draft. Returns `false` when the active note is persisted.
    pub fn discard_draft(&mut self) -> bool {
        if self.active().is_some_and(Note::is_persisted) {
            return false;
        }
        self.activate_first_or_draft();
        true
    }

    fn activate_first_or_draft(&mut self) {
        let next = self.notes.first().cloned().unwrap_or_else(Note::draft);
        self.active = Some(ActiveNote::clean(next));
    }

    fn activate(&mut self, note: Note) -> Option<Note> {
        let previous = self.active.replace(ActiveNote::clean(note))?;
        if previous.dirty {
            tracing::warn!(
                "Discarding unsaved edits of {}",
                previous
                    .note
                    .id
                    .as_ref()
                    .map_or_else(|| "new note".to_string(), ToString::to_string)
            );
            Some(previous.note)
        } else {
            None
        }
    }
}

fn apply_patch(note: &mut Note, patch: &NotePatch) {
    if let Some(title) = &patch.title {
        note.title.clone_from(title);
    }
    if let Some(content) = &patch.content {
        note.content.clone_from(content);
    }
}
