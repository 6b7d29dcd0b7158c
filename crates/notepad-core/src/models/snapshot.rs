//! Collection snapshots

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{Note, NoteId};

/// A complete, ordered materialization of one notes collection.
///
/// Notes are ordered by `updated_at` descending, ties broken by id so the
/// order is total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    notes: Vec<Note>,
}

impl Snapshot {
    /// Build a snapshot, putting the notes in collection order
    #[must_use]
    pub fn new(mut notes: Vec<Note>) -> Self {
        sort_notes(&mut notes);
        Self { notes }
    }

    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    #[must_use]
    pub fn into_notes(self) -> Vec<Note> {
        self.notes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Find a note by id
    #[must_use]
    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.has_id(id))
    }
}

/// Sort notes newest-first by `updated_at`.
///
/// Pending timestamps (`None`) sort first, the way a store reports a write it
/// has not stamped yet as the most recent one.
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(|a, b| match (a.updated_at, b.updated_at) {
        (Some(left), Some(right)) => right.cmp(&left).then_with(|| a.id.cmp(&b.id)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(id: &str, updated_at: Option<i64>) -> Note {
        Note {
            id: Some(NoteId::new(id)),
            title: id.to_string(),
            content: String::new(),
            updated_at,
        }
    }

    fn ids(snapshot: &Snapshot) -> Vec<&str> {
        snapshot
            .notes()
            .iter()
            .filter_map(|note| note.id.as_ref().map(NoteId::as_str))
            .collect()
    }

    #[test]
    fn snapshot_orders_newest_first() {
        let snapshot = Snapshot::new(vec![
            note("a", Some(10)),
            note("b", Some(30)),
            note("c", Some(20)),
        ]);
        assert_eq!(ids(&snapshot), vec!["b", "c", "a"]);
    }

    #[test]
    fn snapshot_breaks_ties_by_id() {
        let snapshot = Snapshot::new(vec![note("z", Some(5)), note("m", Some(5))]);
        assert_eq!(ids(&snapshot), vec!["m", "z"]);
    }

    #[test]
    fn pending_timestamps_sort_first() {
        let snapshot = Snapshot::new(vec![note("a", Some(99)), note("b", None)]);
        assert_eq!(ids(&snapshot), vec!["b", "a"]);
    }

    #[test]
    fn get_finds_by_id() {
        let snapshot = Snapshot::new(vec![note("a", Some(1))]);
        assert!(snapshot.get(&NoteId::new("a")).is_some());
        assert!(snapshot.get(&NoteId::new("b")).is_none());
    }
}
