//! Note stores: the document collection notes are persisted to.

mod memory;
mod path;
mod sqlite;
mod subscription;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NoteId, NotePatch, Snapshot};

pub use memory::{MemoryNoteStore, StoreOperation};
pub use path::CollectionPath;
pub use sqlite::SqliteNoteStore;
pub use subscription::{SnapshotSender, Subscription};

/// A document collection keyed by opaque ids with live snapshot queries.
///
/// Every write stamps `updated_at` with the store's own clock; callers never
/// supply timestamps.
#[async_trait]
pub trait NoteStore: Send + Sync + 'static {
    /// Create a document and return its newly assigned id.
    async fn create(&self, path: &CollectionPath, patch: NotePatch) -> Result<NoteId>;

    /// Merge the given fields into the document `id`, leaving absent fields
    /// untouched. A missing document is created.
    async fn merge_update(&self, path: &CollectionPath, id: &NoteId, patch: NotePatch)
        -> Result<()>;

    /// Delete the document `id`. Deleting a missing document succeeds.
    async fn delete(&self, path: &CollectionPath, id: &NoteId) -> Result<()>;

    /// Read the current collection once.
    async fn fetch(&self, path: &CollectionPath) -> Result<Snapshot>;

    /// Open a live query on the collection, ordered by `updated_at` desc.
    ///
    /// The current state is delivered first, then one full snapshot per
    /// change. Must be called from within a tokio runtime.
    fn subscribe(&self, path: &CollectionPath) -> Result<Subscription>;
}
