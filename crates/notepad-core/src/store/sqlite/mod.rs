//! `SQLite`-backed note store.
//!
//! Collections live in a single `notes` table keyed by `(collection, id)`.
//! Several processes may open the same file: local writes are announced over
//! an in-process channel, writes committed by other connections are picked up
//! by polling `PRAGMA data_version`.

mod migrations;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

use super::{CollectionPath, NoteStore, Subscription};
use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NotePatch, Snapshot};
use crate::util::unix_millis_now;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

struct Inner {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<CollectionPath>,
}

/// Note store persisted to a `SQLite` database file.
#[derive(Clone)]
pub struct SqliteNoteStore {
    inner: Arc<Inner>,
    poll_interval: Duration,
}

impl SqliteNoteStore {
    /// Open a store at the given path, creating the file if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::debug!("Opened note store at {}", path.display());
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Set how often live queries check for commits from other connections
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        configure(&conn)?;
        migrations::run(&conn)?;
        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                changes,
            }),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Run a blocking database call off the async executor.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut conn = inner
                .conn
                .lock()
                .map_err(|_| Error::Store("note store connection lock poisoned".to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|error| Error::Store(format!("note store task failed: {error}")))?
    }

    async fn data_version(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?))
            .await
    }

    fn publish(&self, path: &CollectionPath) {
        let _ = self.inner.changes.send(path.clone());
    }
}

/// Configure `SQLite` for a store shared between processes
fn configure(conn: &Connection) -> Result<()> {
    // In-memory databases report "memory" instead of switching to WAL.
    conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))
        .optional()?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// Server clock for a collection: wall time, strictly after the newest write.
fn next_timestamp(conn: &Connection, path: &CollectionPath) -> Result<i64> {
    let newest: i64 = conn.query_row(
        "SELECT COALESCE(MAX(updated_at), 0) FROM notes WHERE collection = ?1",
        params![path.as_str()],
        |row| row.get(0),
    )?;
    Ok(unix_millis_now().max(newest + 1))
}

fn parse_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    let id: String = row.get(0)?;
    Ok(Note {
        id: Some(NoteId::new(id)),
        title: row.get(1)?,
        content: row.get(2)?,
        updated_at: Some(row.get(3)?),
    })
}

fn read_collection(conn: &Connection, path: &CollectionPath) -> Result<Snapshot> {
    let mut stmt = conn.prepare(
        "SELECT id, title, content, updated_at
         FROM notes
         WHERE collection = ?1
         ORDER BY updated_at DESC, id ASC",
    )?;
    let notes = stmt
        .query_map(params![path.as_str()], parse_note)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Snapshot::new(notes))
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn create(&self, path: &CollectionPath, patch: NotePatch) -> Result<NoteId> {
        let owned_path = path.clone();
        let id = self
            .with_conn(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let id = NoteId::generate();
                let updated_at = next_timestamp(&tx, &owned_path)?;
                tx.execute(
                    "INSERT INTO notes (collection, id, title, content, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        owned_path.as_str(),
                        id.as_str(),
                        patch.title.unwrap_or_default(),
                        patch.content.unwrap_or_default(),
                        updated_at
                    ],
                )?;
                tx.commit()?;
                Ok(id)
            })
            .await?;
        tracing::debug!("Created note {} in {}", id, path);
        self.publish(path);
        Ok(id)
    }

    async fn merge_update(
        &self,
        path: &CollectionPath,
        id: &NoteId,
        patch: NotePatch,
    ) -> Result<()> {
        let owned_path = path.clone();
        let owned_id = id.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let updated_at = next_timestamp(&tx, &owned_path)?;
            tx.execute(
                "INSERT INTO notes (collection, id, title, content, updated_at)
                 VALUES (?1, ?2, COALESCE(?3, ''), COALESCE(?4, ''), ?5)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    title = COALESCE(?3, title),
                    content = COALESCE(?4, content),
                    updated_at = ?5",
                params![
                    owned_path.as_str(),
                    owned_id.as_str(),
                    patch.title,
                    patch.content,
                    updated_at
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?;
        tracing::debug!("Updated note {} in {}", id, path);
        self.publish(path);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &NoteId) -> Result<()> {
        let owned_path = path.clone();
        let owned_id = id.clone();
        let removed = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM notes WHERE collection = ?1 AND id = ?2",
                    params![owned_path.as_str(), owned_id.as_str()],
                )?)
            })
            .await?;
        tracing::debug!("Deleted note {} from {} ({} row(s))", id, path, removed);
        self.publish(path);
        Ok(())
    }

    async fn fetch(&self, path: &CollectionPath) -> Result<Snapshot> {
        let owned_path = path.clone();
        self.with_conn(move |conn| read_collection(conn, &owned_path))
            .await
    }

    fn subscribe(&self, path: &CollectionPath) -> Result<Subscription> {
        let (sender, subscription) = Subscription::channel(path.clone());
        let mut changes = self.inner.changes.subscribe();
        let store = self.clone();
        let path = path.clone();

        tokio::spawn(async move {
            let mut last_version = store.data_version().await.ok();
            let initial = store.fetch(&path).await;
            let mut last_sent = initial.as_ref().ok().cloned();
            if !sender.send(initial).await {
                return;
            }

            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                let (refresh, polled) = tokio::select! {
                    () = sender.cancelled() => break,
                    changed = changes.recv() => match changed {
                        Ok(changed) => (changed == path, false),
                        Err(RecvError::Lagged(_)) => (true, false),
                        Err(RecvError::Closed) => break,
                    },
                    _ = ticker.tick() => match store.data_version().await {
                        Ok(version) if Some(version) != last_version => {
                            last_version = Some(version);
                            (true, true)
                        }
                        Ok(_) => (false, false),
                        Err(error) => {
                            tracing::warn!("Failed to poll note store for {}: {}", path, error);
                            (false, false)
                        }
                    },
                };
                if !refresh {
                    continue;
                }

                let snapshot = store.fetch(&path).await;
                // Commits by other connections may touch other collections.
                if polled && snapshot.as_ref().ok() == last_sent.as_ref() {
                    continue;
                }
                last_sent = snapshot.as_ref().ok().cloned();
                if !sender.send(snapshot).await {
                    break;
                }
            }
            tracing::debug!("Snapshot feed for {} stopped", path);
        });

        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn path(user: &str) -> CollectionPath {
        CollectionPath::notes("app", &Identity::new(user)).unwrap()
    }

    fn patch(title: &str, content: &str) -> NotePatch {
        NotePatch {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
        }
    }

    fn titles(snapshot: &Snapshot) -> Vec<String> {
        snapshot.notes().iter().map(|n| n.title.clone()).collect()
    }

    #[tokio::test]
    async fn test_create_and_fetch_newest_first() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let path = path("u1");

        store.create(&path, patch("first", "<p>1</p>")).await.unwrap();
        store.create(&path, patch("second", "<p>2</p>")).await.unwrap();
        store.create(&path, patch("third", "<p>3</p>")).await.unwrap();

        let snapshot = store.fetch(&path).await.unwrap();
        assert_eq!(titles(&snapshot), vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_merge_update_moves_note_to_front_and_keeps_content() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let path = path("u1");

        let first = store.create(&path, patch("first", "<p>body</p>")).await.unwrap();
        store.create(&path, patch("second", "<p>2</p>")).await.unwrap();
        store
            .merge_update(
                &path,
                &first,
                NotePatch {
                    title: Some("renamed".to_string()),
                    content: None,
                },
            )
            .await
            .unwrap();

        let snapshot = store.fetch(&path).await.unwrap();
        assert_eq!(titles(&snapshot), vec!["renamed", "second"]);
        assert_eq!(snapshot.get(&first).unwrap().content, "<p>body</p>");
    }

    #[tokio::test]
    async fn test_merge_update_creates_missing_document() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let path = path("u1");
        let id = NoteId::new("restored");

        store.merge_update(&path, &id, patch("back", "<p>x</p>")).await.unwrap();
        assert_eq!(store.fetch(&path).await.unwrap().get(&id).unwrap().title, "back");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let path = path("u1");

        let id = store.create(&path, patch("gone", "")).await.unwrap();
        store.delete(&path, &id).await.unwrap();
        store.delete(&path, &id).await.unwrap();

        assert!(store.fetch(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("notes.db");
        let path = path("u1");

        {
            let store = SqliteNoteStore::open(&db_path).unwrap();
            store.create(&path, patch("kept", "<p>k</p>")).await.unwrap();
        }

        let reopened = SqliteNoteStore::open(&db_path).unwrap();
        assert_eq!(titles(&reopened.fetch(&path).await.unwrap()), vec!["kept"]);
    }

    #[tokio::test]
    async fn test_subscription_sees_local_writes() {
        let store = SqliteNoteStore::open_in_memory().unwrap();
        let path = path("u1");
        let mut subscription = store.subscribe(&path).unwrap();

        assert!(subscription.next().await.unwrap().unwrap().is_empty());
        let id = store.create(&path, patch("live", "")).await.unwrap();

        let snapshot = subscription.next().await.unwrap().unwrap();
        assert!(snapshot.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_subscription_sees_writes_from_other_connections() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("shared.db");
        let path = path("u1");

        let watcher = SqliteNoteStore::open(&db_path)
            .unwrap()
            .with_poll_interval(Duration::from_millis(20));
        let writer = SqliteNoteStore::open(&db_path).unwrap();

        let mut subscription = watcher.subscribe(&path).unwrap();
        assert!(subscription.next().await.unwrap().unwrap().is_empty());

        let id = writer.create(&path, patch("elsewhere", "")).await.unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), subscription.next())
            .await
            .expect("external write should be observed")
            .unwrap()
            .unwrap();
        assert!(snapshot.get(&id).is_some());
    }
}
