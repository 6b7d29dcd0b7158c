//! Session context: who is signed in and which collection they see.

use std::sync::Arc;

use crate::error::Result;
use crate::identity::{Identity, IdentityProvider};
use crate::models::Snapshot;
use crate::store::{CollectionPath, NoteStore, Subscription};

/// Everything a workspace needs to talk to the store on behalf of one
/// identity: the identity itself, the store handle, the scoped collection
/// path and at most one live subscription.
pub struct SessionContext<S: NoteStore> {
    app_id: String,
    identity: Identity,
    store: Arc<S>,
    collection: CollectionPath,
    subscription: Option<Subscription>,
}

impl<S: NoteStore> SessionContext<S> {
    /// Create a session for an already established identity.
    pub fn new(identity: Identity, store: Arc<S>, app_id: impl Into<String>) -> Result<Self> {
        let app_id = app_id.into();
        let collection = CollectionPath::notes(&app_id, &identity)?;
        Ok(Self {
            app_id,
            identity,
            store,
            collection,
            subscription: None,
        })
    }

    /// Establish an identity, scope the session to it and open the live
    /// subscription.
    pub async fn bootstrap(
        provider: &dyn IdentityProvider,
        store: Arc<S>,
        app_id: impl Into<String>,
    ) -> Result<Self> {
        let identity = provider.identify().await?;
        let mut session = Self::new(identity, store, app_id)?;
        session.open_subscription()?;
        tracing::info!(
            "Session started for {} on {}",
            session.identity,
            session.collection
        );
        Ok(session)
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub const fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|subscription| !subscription.is_cancelled())
    }

    /// Open the live query on this session's collection, cancelling any
    /// subscription that is already open.
    pub fn open_subscription(&mut self) -> Result<()> {
        self.cancel_subscription();
        self.subscription = Some(self.store.subscribe(&self.collection)?);
        Ok(())
    }

    /// Wait for the next snapshot.
    ///
    /// Pends forever while no subscription is open, so it can sit in a
    /// `select!` next to other event sources. Returns `None` once when the
    /// producer stops; the subscription is then dropped.
    pub async fn next_snapshot(&mut self) -> Option<Result<Snapshot>> {
        let Some(subscription) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };
        let item = subscription.next().await;
        if item.is_none() {
            tracing::debug!("Subscription on {} ended", self.collection);
            self.subscription = None;
        }
        item
    }

    /// Re-scope the session to another identity.
    ///
    /// The outstanding subscription (if any) is cancelled before the new one
    /// is opened. Returns whether a subscription was cancelled.
    pub fn switch_identity(&mut self, identity: Identity) -> Result<bool> {
        let collection = CollectionPath::notes(&self.app_id, &identity)?;
        let cancelled = self.cancel_subscription();
        tracing::info!("Switching session from {} to {}", self.identity, identity);
        self.identity = identity;
        self.collection = collection;
        self.open_subscription()?;
        Ok(cancelled)
    }

    /// Tear down the live subscription.
    pub fn close(&mut self) {
        if self.cancel_subscription() {
            tracing::info!("Session for {} closed", self.identity);
        }
    }

    fn cancel_subscription(&mut self) -> bool {
        self.subscription.take().is_some_and(|subscription| {
            let was_live = !subscription.is_cancelled();
            subscription.cancel();
            was_live
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AuthResult;
    use crate::models::NotePatch;
    use crate::store::MemoryNoteStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedIdentity(&'static str);

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn identify(&self) -> AuthResult<Identity> {
            Ok(Identity::new(self.0))
        }
    }

    struct BrokenIdentity;

    #[async_trait]
    impl IdentityProvider for BrokenIdentity {
        async fn identify(&self) -> AuthResult<Identity> {
            Err(crate::identity::AuthError::Api("offline".to_string()))
        }
    }

    fn patch(title: &str) -> NotePatch {
        NotePatch {
            title: Some(title.to_string()),
            content: Some(format!("<p>{title}</p>")),
        }
    }

    #[tokio::test]
    async fn bootstrap_scopes_collection_and_subscribes() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut session = SessionContext::bootstrap(&FixedIdentity("u1"), store, "app")
            .await
            .unwrap();

        assert_eq!(session.identity().as_str(), "u1");
        assert_eq!(session.collection().as_str(), "artifacts/app/users/u1/notes");
        assert!(session.is_subscribed());

        let first = session.next_snapshot().await.unwrap().unwrap();
        assert!(first.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_propagates_identity_failure() {
        let store = Arc::new(MemoryNoteStore::new());
        let result = SessionContext::bootstrap(&BrokenIdentity, store, "app").await;
        assert!(matches!(result, Err(crate::Error::Identity(_))));
    }

    #[tokio::test]
    async fn switching_identity_cancels_exactly_one_subscription() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut session = SessionContext::bootstrap(&FixedIdentity("u1"), Arc::clone(&store), "app")
            .await
            .unwrap();
        session.next_snapshot().await.unwrap().unwrap();

        assert!(session.switch_identity(Identity::new("u2")).unwrap());
        assert!(session.is_subscribed());
        assert_eq!(session.collection().as_str(), "artifacts/app/users/u2/notes");

        let initial = session.next_snapshot().await.unwrap().unwrap();
        assert!(initial.is_empty());

        let old = CollectionPath::notes("app", &Identity::new("u1")).unwrap();
        store.create(&old, patch("old")).await.unwrap();
        let id = store.create(session.collection(), patch("new")).await.unwrap();

        let next = session.next_snapshot().await.unwrap().unwrap();
        assert_eq!(next.len(), 1);
        assert!(next.get(&id).is_some());
    }

    #[tokio::test]
    async fn reopening_replaces_the_previous_subscription() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut session = SessionContext::new(Identity::new("u1"), store, "app").unwrap();
        assert!(!session.is_subscribed());

        session.open_subscription().unwrap();
        session.open_subscription().unwrap();
        assert!(session.is_subscribed());
        assert!(session.next_snapshot().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn closed_session_stops_delivering_snapshots() {
        let store = Arc::new(MemoryNoteStore::new());
        let mut session = SessionContext::bootstrap(&FixedIdentity("u1"), store, "app")
            .await
            .unwrap();
        session.close();
        assert!(!session.is_subscribed());

        let pending =
            tokio::time::timeout(Duration::from_millis(50), session.next_snapshot()).await;
        assert!(pending.is_err());
    }
}
