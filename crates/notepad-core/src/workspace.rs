//! Workspace: the controller wired to a live session.
//!
//! All methods take `&mut self`, so snapshot processing and user actions are
//! applied one at a time in the order the caller's event loop sees them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::controller::{NoteController, PendingSave};
use crate::error::{Error, Result};
use crate::export::{export_note, DocumentRenderer};
use crate::identity::{Identity, IdentityProvider};
use crate::models::{Note, NoteId, Snapshot};
use crate::session::SessionContext;
use crate::store::NoteStore;

/// Default time the "saved" indicator stays visible.
pub const DEFAULT_SAVED_INDICATOR: Duration = Duration::from_millis(1000);

const NOTICE_DURATION: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No session or no active note; nothing was written
    Unavailable,
    /// A draft was created and adopted the returned id
    Created(NoteId),
    /// A persisted note was merge-updated
    Updated,
    /// The write failed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Unavailable,
    /// The note was removed locally and the store confirmed the delete
    Deleted(NoteId),
    /// An unsaved draft was dropped; the store was not involved
    Discarded,
    /// The store rejected the delete; local state was re-read
    Failed(String),
}

/// A delete that has been applied locally and still awaits the store.
#[derive(Debug)]
#[must_use = "the store delete only happens in `Workspace::finish_delete`"]
pub struct PendingDelete {
    id: NoteId,
}

/// A save whose write has been prepared and still awaits the store.
#[derive(Debug)]
#[must_use = "the store write only happens in `Workspace::finish_save`"]
pub struct InFlightSave {
    write: PendingSave,
}

#[derive(Debug, Clone)]
struct Notice {
    message: String,
    expires_at: Instant,
}

pub struct Workspace<S: NoteStore> {
    session: Option<SessionContext<S>>,
    controller: NoteController,
    saved_indicator: Duration,
    saving: bool,
    saved_until: Option<Instant>,
    notice: Option<Notice>,
}

impl<S: NoteStore> Workspace<S> {
    /// A workspace without a session, still loading.
    #[must_use]
    pub const fn new(saved_indicator: Duration) -> Self {
        Self {
            session: None,
            controller: NoteController::new(),
            saved_indicator,
            saving: false,
            saved_until: None,
            notice: None,
        }
    }

    #[must_use]
    pub fn with_session(session: SessionContext<S>, saved_indicator: Duration) -> Self {
        let mut workspace = Self::new(saved_indicator);
        workspace.session = Some(session);
        workspace
    }

    /// Establish the session. On failure the workspace leaves its loading
    /// state with a notice and the error is returned.
    pub async fn connect(
        &mut self,
        provider: &dyn IdentityProvider,
        store: Arc<S>,
        app_id: &str,
    ) -> Result<()> {
        match SessionContext::bootstrap(provider, store, app_id).await {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(error) => {
                self.fail_bootstrap(&error);
                Err(error)
            }
        }
    }

    /// Record a failed bootstrap and stop loading.
    pub fn fail_bootstrap(&mut self, error: &Error) {
        tracing::error!("Failed to start session: {}", error);
        self.set_notice(format!("Could not start session: {error}"));
        self.controller.finish_loading();
    }

    #[must_use]
    pub const fn controller(&self) -> &NoteController {
        &self.controller
    }

    #[must_use]
    pub const fn session(&self) -> Option<&SessionContext<S>> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(SessionContext::identity)
    }

    #[must_use]
    pub fn notes(&self) -> &[Note] {
        self.controller.notes()
    }

    #[must_use]
    pub fn active(&self) -> Option<&Note> {
        self.controller.active()
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.controller.is_loading()
    }

    /// Whether a save has been started and its write has not settled yet.
    #[must_use]
    pub const fn is_saving(&self) -> bool {
        self.saving
    }

    /// Whether the transient "saved" indicator is currently shown: from the
    /// start of a save until `saved_indicator` after its write settled.
    #[must_use]
    pub fn is_saved_indicator_visible(&self) -> bool {
        self.saving
            || self
                .saved_until
                .is_some_and(|deadline| Instant::now() < deadline)
    }

    /// The latest failure notice, while it has not expired.
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|notice| Instant::now() < notice.expires_at)
            .map(|notice| notice.message.as_str())
    }

    /// Wait for the next item from the live subscription.
    ///
    /// Pends forever without a session.
    pub async fn next_snapshot(&mut self) -> Option<Result<Snapshot>> {
        match self.session.as_mut() {
            Some(session) => session.next_snapshot().await,
            None => std::future::pending().await,
        }
    }

    /// Apply one subscription item to the controller.
    pub fn handle_snapshot(&mut self, item: Result<Snapshot>) {
        match item {
            Ok(snapshot) => self.controller.apply_snapshot(snapshot),
            Err(error) => {
                tracing::error!("Snapshot subscription failed: {}", error);
                self.set_notice(format!("Sync failed: {error}"));
            }
        }
    }

    /// Wait for and apply the next subscription item. Returns `false` once
    /// the subscription has ended.
    pub async fn process_next_snapshot(&mut self) -> bool {
        match self.next_snapshot().await {
            Some(item) => {
                self.handle_snapshot(item);
                true
            }
            None => false,
        }
    }

    /// Re-open the live subscription, for instance after it failed.
    pub fn resubscribe(&mut self) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidInput("no active session".to_string()))?;
        session.open_subscription()
    }

    /// Scope the workspace to another identity. Local state is reset and
    /// reloads from the new collection.
    pub fn switch_identity(&mut self, identity: Identity) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InvalidInput("no active session".to_string()))?;
        session.switch_identity(identity)?;
        self.controller = NoteController::new();
        Ok(())
    }

    /// Activate a new draft. Returns discarded unsaved edits, if any.
    pub fn new_note(&mut self) -> Option<Note> {
        self.controller.new_note()
    }

    pub fn select(&mut self, id: &NoteId) -> Result<Option<Note>> {
        self.controller.select(id)
    }

    pub fn edit(&mut self, content: impl Into<String>) -> bool {
        self.controller.edit(content)
    }

    /// Save the active note.
    ///
    /// Drafts are created and adopt the store-assigned id; persisted notes
    /// are merge-updated. The saved indicator is shown from the start of the
    /// save until shortly after the write settles, whatever its result.
    pub async fn save(&mut self) -> SaveOutcome {
        match self.begin_save() {
            Some(save) => self.finish_save(save).await,
            None => SaveOutcome::Unavailable,
        }
    }

    /// Prepare the write for the active note and raise the saving indicator.
    /// Returns `None` without a session or an active note.
    pub fn begin_save(&mut self) -> Option<InFlightSave> {
        self.session.as_ref()?;
        let write = self.controller.prepare_save()?;
        self.saving = true;
        Some(InFlightSave { write })
    }

    /// Issue the store write of a started save and record its result.
    pub async fn finish_save(&mut self, save: InFlightSave) -> SaveOutcome {
        let Some((store, path)) = self
            .session
            .as_ref()
            .map(|session| (Arc::clone(session.store()), session.collection().clone()))
        else {
            self.saving = false;
            return SaveOutcome::Unavailable;
        };

        let outcome = match save.write {
            PendingSave::Create(patch) => match store.create(&path, patch.clone()).await {
                Ok(id) => {
                    tracing::info!("Created note {}", id);
                    self.controller.complete_create(id.clone(), &patch);
                    SaveOutcome::Created(id)
                }
                Err(error) => self.save_failed(&error),
            },
            PendingSave::Update(id, patch) => {
                match store.merge_update(&path, &id, patch.clone()).await {
                    Ok(()) => {
                        tracing::info!("Updated note {}", id);
                        self.controller.complete_update(&id, &patch);
                        SaveOutcome::Updated
                    }
                    Err(error) => self.save_failed(&error),
                }
            }
        };

        self.saving = false;
        self.saved_until = Some(Instant::now() + self.saved_indicator);
        outcome
    }

    /// Delete `id`: remove it locally, then from the store.
    pub async fn delete(&mut self, id: &NoteId) -> DeleteOutcome {
        match self.begin_delete(id) {
            Some(pending) => self.finish_delete(pending).await,
            None => DeleteOutcome::Unavailable,
        }
    }

    /// Delete the active note, or discard it when it was never saved.
    pub async fn delete_active(&mut self) -> DeleteOutcome {
        let Some(active) = self.controller.active() else {
            return DeleteOutcome::Unavailable;
        };
        match active.id.clone() {
            Some(id) => self.delete(&id).await,
            None => {
                self.controller.discard_draft();
                tracing::info!("Discarded unsaved note");
                DeleteOutcome::Discarded
            }
        }
    }

    /// Apply the local half of a delete. Returns `None` without a session.
    pub fn begin_delete(&mut self, id: &NoteId) -> Option<PendingDelete> {
        self.session.as_ref()?;
        self.controller.remove_local(id);
        Some(PendingDelete { id: id.clone() })
    }

    /// Issue the store delete for a locally applied delete.
    ///
    /// On failure the collection is re-read once so the note reappears; the
    /// delete itself is not retried.
    pub async fn finish_delete(&mut self, pending: PendingDelete) -> DeleteOutcome {
        let Some((store, path)) = self
            .session
            .as_ref()
            .map(|session| (Arc::clone(session.store()), session.collection().clone()))
        else {
            return DeleteOutcome::Unavailable;
        };
        let id = pending.id;

        match store.delete(&path, &id).await {
            Ok(()) => {
                tracing::info!("Deleted note {}", id);
                DeleteOutcome::Deleted(id)
            }
            Err(error) => {
                tracing::error!("Failed to delete note {}: {}", id, error);
                self.set_notice(format!("Delete failed: {error}"));
                match store.fetch(&path).await {
                    Ok(snapshot) => self.controller.apply_snapshot(snapshot),
                    Err(fetch_error) => {
                        tracing::warn!("Failed to re-read notes after delete: {}", fetch_error);
                    }
                }
                DeleteOutcome::Failed(error.to_string())
            }
        }
    }

    /// Export the active note into `dir`.
    pub fn export_active(&self, renderer: &dyn DocumentRenderer, dir: &Path) -> Result<PathBuf> {
        let note = self
            .controller
            .active()
            .ok_or_else(|| Error::Export("no active note".to_string()))?;
        export_note(renderer, note, dir).inspect_err(|error| {
            tracing::error!("Failed to export note: {}", error);
        })
    }

    /// Tear down the live subscription.
    pub fn close(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.close();
        }
    }

    fn save_failed(&mut self, error: &Error) -> SaveOutcome {
        tracing::error!("Failed to save note: {}", error);
        self.set_notice(format!("Save failed: {error}"));
        SaveOutcome::Failed(error.to_string())
    }

    fn set_notice(&mut self, message: String) {
        self.notice = Some(Notice {
            message,
            expires_at: Instant::now() + NOTICE_DURATION,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::TextPdfRenderer;
    use crate::identity::AuthResult;
    use crate::models::NotePatch;
    use crate::store::{CollectionPath, MemoryNoteStore, StoreOperation, Subscription};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use tokio::sync::Notify;

    const APP: &str = "app";

    /// Memory store whose deletes wait until released.
    struct GatedStore {
        inner: MemoryNoteStore,
        release: Notify,
    }

    #[async_trait]
    impl NoteStore for GatedStore {
        async fn create(&self, path: &CollectionPath, patch: NotePatch) -> Result<NoteId> {
            self.inner.create(path, patch).await
        }

        async fn merge_update(
            &self,
            path: &CollectionPath,
            id: &NoteId,
            patch: NotePatch,
        ) -> Result<()> {
            self.inner.merge_update(path, id, patch).await
        }

        async fn delete(&self, path: &CollectionPath, id: &NoteId) -> Result<()> {
            self.release.notified().await;
            self.inner.delete(path, id).await
        }

        async fn fetch(&self, path: &CollectionPath) -> Result<Snapshot> {
            self.inner.fetch(path).await
        }

        fn subscribe(&self, path: &CollectionPath) -> Result<Subscription> {
            self.inner.subscribe(path)
        }
    }

    struct FixedIdentity;

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn identify(&self) -> AuthResult<Identity> {
            Ok(Identity::new("user-1"))
        }
    }

    struct OfflineIdentity;

    #[async_trait]
    impl IdentityProvider for OfflineIdentity {
        async fn identify(&self) -> AuthResult<Identity> {
            Err(crate::identity::AuthError::Api("offline".to_string()))
        }
    }

    fn collection() -> CollectionPath {
        CollectionPath::notes(APP, &Identity::new("user-1")).unwrap()
    }

    fn patch(body: &str) -> NotePatch {
        NotePatch {
            title: Some(body.to_string()),
            content: Some(format!("<p>{body}</p>")),
        }
    }

    async fn connected<S: NoteStore>(store: Arc<S>) -> Workspace<S> {
        let mut workspace = Workspace::new(DEFAULT_SAVED_INDICATOR);
        workspace.connect(&FixedIdentity, store, APP).await.unwrap();
        assert!(workspace.process_next_snapshot().await);
        workspace
    }

    /// Apply snapshots until the list has `len` notes.
    async fn settle<S: NoteStore>(workspace: &mut Workspace<S>, len: usize) {
        while workspace.notes().len() != len {
            assert!(workspace.process_next_snapshot().await);
        }
    }

    #[tokio::test]
    async fn save_without_session_is_unavailable() {
        let mut workspace = Workspace::<MemoryNoteStore>::new(DEFAULT_SAVED_INDICATOR);
        assert_eq!(workspace.save().await, SaveOutcome::Unavailable);
        assert!(!workspace.is_saved_indicator_visible());
    }

    #[tokio::test]
    async fn failed_bootstrap_clears_loading() {
        let mut workspace = Workspace::new(DEFAULT_SAVED_INDICATOR);
        assert!(workspace.is_loading());

        let result = workspace
            .connect(&OfflineIdentity, Arc::new(MemoryNoteStore::new()), APP)
            .await;
        assert!(result.is_err());
        assert!(!workspace.is_loading());
        assert!(workspace.notice().is_some());
    }

    #[tokio::test]
    async fn saving_a_draft_creates_once_and_adopts_id() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut workspace = connected(Arc::clone(&store)).await;
        assert!(!workspace.is_loading());
        assert!(workspace.active().unwrap().id.is_none());

        workspace.edit("<h1>Hello World</h1><p>more</p>");
        let before = workspace.active().unwrap().clone();

        let SaveOutcome::Created(id) = workspace.save().await else {
            panic!("expected a create");
        };
        assert_eq!(store.operations(), vec![StoreOperation::Create(id.clone())]);

        let stored = store.fetch(&collection()).await.unwrap();
        let stored = stored.get(&id).unwrap();
        assert_eq!(stored.title, "Hello World");

        let active = workspace.active().unwrap();
        assert_eq!(active.id.as_ref(), Some(&id));
        assert_eq!(active.title, stored.title);
        assert_eq!(active.content, before.content);
        assert_eq!(active.content, stored.content);
    }

    #[tokio::test]
    async fn saving_a_persisted_note_merges_into_it() {
        let store = Arc::new(MemoryNoteStore::new());
        let id = store.create(&collection(), patch("first")).await.unwrap();
        let mut workspace = connected(Arc::clone(&store)).await;
        assert_eq!(workspace.active().unwrap().id.as_ref(), Some(&id));

        workspace.edit("<p>changed</p>");
        assert_eq!(workspace.save().await, SaveOutcome::Updated);

        assert_eq!(
            store.operations(),
            vec![StoreOperation::Create(id.clone()), StoreOperation::Update(id.clone())]
        );
        let stored = store.fetch(&collection()).await.unwrap();
        assert_eq!(stored.get(&id).unwrap().title, "changed");
        assert_eq!(workspace.active().unwrap().title, "changed");
        assert!(!workspace.controller().is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn saving_indicator_is_raised_before_the_write() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut workspace = connected(Arc::clone(&store)).await;
        workspace.edit("<p>draft</p>");

        let save = workspace.begin_save().unwrap();
        assert!(workspace.is_saving());
        assert!(workspace.is_saved_indicator_visible());
        assert!(store.operations().is_empty());

        assert!(matches!(
            workspace.finish_save(save).await,
            SaveOutcome::Created(_)
        ));
        assert!(!workspace.is_saving());
        assert!(workspace.is_saved_indicator_visible());

        tokio::time::advance(DEFAULT_SAVED_INDICATOR).await;
        assert!(!workspace.is_saved_indicator_visible());
    }

    #[tokio::test]
    async fn snapshot_after_create_refreshes_adopted_note() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut workspace = connected(Arc::clone(&store)).await;
        workspace.edit("<p>Body</p>");
        workspace.save().await;

        settle(&mut workspace, 1).await;
        let active = workspace.active().unwrap();
        assert_eq!(active.title, "Body");
        assert!(active.updated_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_still_shows_and_clears_indicator() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut workspace = connected(Arc::clone(&store)).await;
        store.set_fail_writes(true);

        let outcome = workspace.save().await;
        assert!(matches!(outcome, SaveOutcome::Failed(_)));
        assert!(workspace.is_saved_indicator_visible());
        assert!(workspace.notice().unwrap().starts_with("Save failed"));
        assert!(workspace.active().unwrap().id.is_none());

        tokio::time::advance(DEFAULT_SAVED_INDICATOR).await;
        assert!(!workspace.is_saved_indicator_visible());
    }

    #[tokio::test]
    async fn delete_removes_locally_before_store_confirms() {
        let store = Arc::new(GatedStore {
            inner: MemoryNoteStore::new(),
            release: Notify::new(),
        });
        let a = store.create(&collection(), patch("a")).await.unwrap();
        let b = store.create(&collection(), patch("b")).await.unwrap();
        let mut workspace = connected(Arc::clone(&store)).await;
        assert_eq!(workspace.active().unwrap().id.as_ref(), Some(&b));

        let pending = workspace.begin_delete(&b).unwrap();
        assert_eq!(workspace.notes().len(), 1);
        assert_eq!(workspace.active().unwrap().id.as_ref(), Some(&a));
        assert!(!store
            .inner
            .operations()
            .contains(&StoreOperation::Delete(b.clone())));

        store.release.notify_one();
        assert_eq!(
            workspace.finish_delete(pending).await,
            DeleteOutcome::Deleted(b.clone())
        );
        assert!(store.fetch(&collection()).await.unwrap().get(&b).is_none());
    }

    #[tokio::test]
    async fn deleting_last_note_activates_draft() {
        let store = Arc::new(MemoryNoteStore::new());
        let id = store.create(&collection(), patch("only")).await.unwrap();
        let mut workspace = connected(Arc::clone(&store)).await;

        assert_eq!(workspace.delete(&id).await, DeleteOutcome::Deleted(id));
        assert!(workspace.notes().is_empty());
        assert_eq!(workspace.active(), Some(&Note::draft()));
    }

    #[tokio::test]
    async fn failed_delete_is_reconciled_by_reread() {
        let store = Arc::new(MemoryNoteStore::new());
        let id = store.create(&collection(), patch("keep")).await.unwrap();
        let mut workspace = connected(Arc::clone(&store)).await;
        store.set_fail_writes(true);

        let outcome = workspace.delete(&id).await;
        assert!(matches!(outcome, DeleteOutcome::Failed(_)));
        assert_eq!(workspace.notes().len(), 1);
        assert!(workspace.notes()[0].has_id(&id));
        assert!(workspace.notice().unwrap().starts_with("Delete failed"));
    }

    #[tokio::test]
    async fn delete_active_discards_unsaved_draft() {
        let store = Arc::new(MemoryNoteStore::new());
        let id = store.create(&collection(), patch("saved")).await.unwrap();
        let mut workspace = connected(Arc::clone(&store)).await;
        workspace.new_note();

        assert_eq!(workspace.delete_active().await, DeleteOutcome::Discarded);
        assert_eq!(workspace.active().unwrap().id.as_ref(), Some(&id));
        assert_eq!(store.operations(), vec![StoreOperation::Create(id)]);
    }

    #[tokio::test]
    async fn subscription_errors_become_notices() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut workspace = connected(Arc::clone(&store)).await;
        store.set_fail_reads(true);
        store.create(&collection(), patch("x")).await.unwrap();

        assert!(workspace.process_next_snapshot().await);
        assert!(workspace.notice().unwrap().starts_with("Sync failed"));

        store.set_fail_reads(false);
        workspace.resubscribe().unwrap();
        settle(&mut workspace, 1).await;
    }

    #[tokio::test]
    async fn switching_identity_reloads_scoped_notes() {
        let store = Arc::new(MemoryNoteStore::new());
        store.create(&collection(), patch("mine")).await.unwrap();
        let mut workspace = connected(Arc::clone(&store)).await;
        assert_eq!(workspace.notes().len(), 1);

        workspace.switch_identity(Identity::new("user-2")).unwrap();
        assert!(workspace.is_loading());
        assert!(workspace.process_next_snapshot().await);
        assert!(workspace.notes().is_empty());
        assert_eq!(workspace.identity().unwrap().as_str(), "user-2");
    }

    #[tokio::test]
    async fn export_active_writes_pdf_without_mutating() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MemoryNoteStore::new());
        store.create(&collection(), patch("My Notes")).await.unwrap();
        let workspace = connected(store).await;
        let before = workspace.controller().clone();

        let path = workspace
            .export_active(&TextPdfRenderer, dir.path())
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "My_Notes.pdf");
        assert_eq!(workspace.controller(), &before);
    }
}
