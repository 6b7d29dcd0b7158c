//! In-process note store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{CollectionPath, NoteStore, Subscription};
use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NotePatch, Snapshot};
use crate::util::unix_millis_now;

/// A write that reached the store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Create(NoteId),
    Update(NoteId),
    Delete(NoteId),
}

#[derive(Debug, Clone)]
struct StoredDoc {
    title: String,
    content: String,
    updated_at: i64,
}

#[derive(Default)]
struct State {
    collections: HashMap<CollectionPath, BTreeMap<NoteId, StoredDoc>>,
    operations: Vec<StoreOperation>,
    clock: i64,
    fail_writes: bool,
    fail_reads: bool,
}

impl State {
    /// Server clock: wall time, forced strictly increasing.
    fn next_timestamp(&mut self) -> i64 {
        self.clock = unix_millis_now().max(self.clock + 1);
        self.clock
    }

    fn snapshot(&self, path: &CollectionPath) -> Result<Snapshot> {
        if self.fail_reads {
            return Err(Error::Store(format!("read of {path} rejected")));
        }
        let notes = self
            .collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| Note {
                        id: Some(id.clone()),
                        title: doc.title.clone(),
                        content: doc.content.clone(),
                        updated_at: Some(doc.updated_at),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Snapshot::new(notes))
    }

    fn check_writable(&self, path: &CollectionPath) -> Result<()> {
        if self.fail_writes {
            Err(Error::Store(format!("write to {path} rejected")))
        } else {
            Ok(())
        }
    }
}

struct Inner {
    state: Mutex<State>,
    changes: broadcast::Sender<CollectionPath>,
}

/// Note store kept in memory and shared by clones.
///
/// Useful for tests and ephemeral sessions. Writes can be made to fail with
/// [`MemoryNoteStore::set_fail_writes`] to exercise error paths.
#[derive(Clone)]
pub struct MemoryNoteStore {
    inner: Arc<Inner>,
}

impl MemoryNoteStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                changes,
            }),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.fail_writes = fail;
        }
    }

    /// Make every subsequent read, including live snapshots, fail.
    pub fn set_fail_reads(&self, fail: bool) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.fail_reads = fail;
        }
    }

    /// Writes accepted so far, oldest first.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.inner
            .state
            .lock()
            .map(|state| state.operations.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.inner
            .state
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    fn publish(&self, path: &CollectionPath) {
        // No receivers just means nobody is subscribed yet.
        let _ = self.inner.changes.send(path.clone());
    }
}

impl Default for MemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn create(&self, path: &CollectionPath, patch: NotePatch) -> Result<NoteId> {
        let id = {
            let mut state = self.lock()?;
            state.check_writable(path)?;
            let id = NoteId::generate();
            let updated_at = state.next_timestamp();
            state.collections.entry(path.clone()).or_default().insert(
                id.clone(),
                StoredDoc {
                    title: patch.title.unwrap_or_default(),
                    content: patch.content.unwrap_or_default(),
                    updated_at,
                },
            );
            state.operations.push(StoreOperation::Create(id.clone()));
            id
        };
        self.publish(path);
        Ok(id)
    }

    async fn merge_update(
        &self,
        path: &CollectionPath,
        id: &NoteId,
        patch: NotePatch,
    ) -> Result<()> {
        {
            let mut state = self.lock()?;
            state.check_writable(path)?;
            let updated_at = state.next_timestamp();
            let docs = state.collections.entry(path.clone()).or_default();
            let doc = docs.entry(id.clone()).or_insert_with(|| StoredDoc {
                title: String::new(),
                content: String::new(),
                updated_at,
            });
            if let Some(title) = patch.title {
                doc.title = title;
            }
            if let Some(content) = patch.content {
                doc.content = content;
            }
            doc.updated_at = updated_at;
            state.operations.push(StoreOperation::Update(id.clone()));
        }
        self.publish(path);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &NoteId) -> Result<()> {
        {
            let mut state = self.lock()?;
            state.check_writable(path)?;
            if let Some(docs) = state.collections.get_mut(path) {
                docs.remove(id);
            }
            state.operations.push(StoreOperation::Delete(id.clone()));
        }
        self.publish(path);
        Ok(())
    }

    async fn fetch(&self, path: &CollectionPath) -> Result<Snapshot> {
        self.lock()?.snapshot(path)
    }

    fn subscribe(&self, path: &CollectionPath) -> Result<Subscription> {
        let (sender, subscription) = Subscription::channel(path.clone());
        // Subscribe before reading the initial state so no change is missed.
        let mut changes = self.inner.changes.subscribe();
        let store = self.clone();
        let path = path.clone();

        tokio::spawn(async move {
            if !sender.send(store.lock().and_then(|s| s.snapshot(&path))).await {
                return;
            }
            loop {
                let changed = tokio::select! {
                    () = sender.cancelled() => break,
                    changed = changes.recv() => changed,
                };
                let relevant = match changed {
                    Ok(changed) => changed == path,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Snapshot feed for {} lagged by {}", path, skipped);
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if relevant && !sender.send(store.lock().and_then(|s| s.snapshot(&path))).await {
                    break;
                }
            }
            tracing::debug!("Snapshot feed for {} stopped", path);
        });

        Ok(subscription)
    }
}
